//! Per module verbose output, passed around as a value.

use std::collections::BTreeSet;

/// The set of module names for which verbose hex dumps are written to the log.
///
/// ```
/// use pgpcore::debug::DebugConfig;
///
/// let cfg = DebugConfig::from_list("validate, signature");
/// assert!(cfg.is_enabled("signature"));
/// assert!(!cfg.is_enabled("keyring"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugConfig {
    modules: BTreeSet<String>,
    all: bool,
}

impl DebugConfig {
    /// Enables verbose output for `module`. The name `all` enables every module.
    pub fn enable(&mut self, module: &str) {
        let module = module.trim();
        if module.is_empty() {
            return;
        }
        if module == "all" {
            self.all = true;
        } else {
            self.modules.insert(module.to_string());
        }
    }

    pub fn is_enabled(&self, module: &str) -> bool {
        self.all || self.modules.contains(module)
    }

    /// Builds a config from a comma separated list of module names.
    pub fn from_list(list: &str) -> Self {
        let mut cfg = Self::default();
        for module in list.split(',') {
            cfg.enable(module);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_list() {
        let cfg = DebugConfig::from_list(" keyring ,,validate");
        assert!(cfg.is_enabled("keyring"));
        assert!(cfg.is_enabled("validate"));
        assert!(!cfg.is_enabled("sym"));

        let cfg = DebugConfig::from_list("all");
        assert!(cfg.is_enabled("sym"));

        assert_eq!(DebugConfig::from_list(""), DebugConfig::default());
    }
}
