//! The macro table: identifier-to-single-token substitution.
//!
//! Same insertion-ordered `Vec<(String, String)>` shape used for section
//! labels — lookups are a linear scan, fine for the handful of macros a
//! toy program defines. Last write wins on duplicate names.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    entries: Vec<(String, String)>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, name: String, value: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == &name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Expand `token` exactly once if it names a macro; otherwise return it
    /// unchanged. The result of an expansion is never itself looked up
    /// again — macro expansion is depth-1 only.
    pub fn expand(&self, token: &str) -> String {
        match self.get(token) {
            Some(value) => value.to_string(),
            None => token.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let mut macros = MacroTable::new();
        macros.insert("R".into(), "5".into());
        macros.insert("R".into(), "7".into());
        assert_eq!(macros.get("R"), Some("7"));
    }

    #[test]
    fn expansion_is_not_recursive() {
        let mut macros = MacroTable::new();
        macros.insert("A".into(), "B".into());
        macros.insert("B".into(), "3".into());
        assert_eq!(macros.expand("A"), "B");
    }

    #[test]
    fn unknown_token_is_unchanged() {
        let macros = MacroTable::new();
        assert_eq!(macros.expand("loadm"), "loadm");
    }
}
