use confmig_protocol::Category;

/// Per-run category enablement, aligned positionally to
/// [`Category::ALL`]. Unspecified trailing categories default to
/// disabled; a vector longer than the registry is rejected rather than
/// silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategorySelection {
    enabled: [bool; Category::ALL.len()],
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("selection vector has {got} flags, the category registry has {max}")]
    TooManyFlags { got: usize, max: usize },
}

impl CategorySelection {
    pub fn from_flags(flags: &[bool]) -> Result<Self, SelectionError> {
        if flags.len() > Category::ALL.len() {
            return Err(SelectionError::TooManyFlags {
                got: flags.len(),
                max: Category::ALL.len(),
            });
        }
        let mut enabled = [false; Category::ALL.len()];
        enabled[..flags.len()].copy_from_slice(flags);
        Ok(Self { enabled })
    }

    pub fn all() -> Self {
        Self {
            enabled: [true; Category::ALL.len()],
        }
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        let idx = Category::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or(usize::MAX);
        self.enabled.get(idx).copied().unwrap_or(false)
    }

    /// Enabled categories in registry order.
    pub fn enabled(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .iter()
            .zip(self.enabled.iter())
            .filter(|(_, on)| **on)
            .map(|(c, _)| *c)
    }

    pub fn is_empty(&self) -> bool {
        !self.enabled.iter().any(|on| *on)
    }
}
