use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A credential that must never be printed. Both `Debug` and `Display` render as `****`, so a `Secret` can sit inside
/// configuration structs that are logged wholesale.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// True if no credential was supplied, or only whitespace was supplied.
    pub fn is_unset(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Reads the credential from the environment. Unset or non-unicode variables produce an empty secret.
    pub fn from_env(name: &str) -> Self {
        Self::new(std::env::var(name).unwrap_or_default())
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
