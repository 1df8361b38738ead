use std::collections::BTreeMap;

/// Query parameters for a collection fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    params: BTreeMap<String, String>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, page: u64) -> Self {
        self.param("page", page.to_string())
    }

    pub fn per_page(self, per_page: u64) -> Self {
        self.param("per_page", per_page.to_string())
    }

    pub fn search(self, term: impl Into<String>) -> Self {
        self.param("search", term)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
