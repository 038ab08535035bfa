use url::form_urlencoded;

use crate::SCREEN_ID_FIELD;

pub const NEXT_BUTTON_FIELD: &str = "button-next";
pub const NEXT_BUTTON_VALUE: &str = "Next";

/// Form fields submitted for one interview page.
///
/// Keys keep the order they were first inserted in, and each key keeps the
/// order its values were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerForm {
    fields: Vec<(String, Vec<String>)>,
}

impl AnswerForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` body
    pub fn from_urlencoded(body: &[u8]) -> Self {
        form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    pub fn to_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }

    /// Replace every value of `key` with `value`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => self.fields[index].1 = vec![value],
            None => self.fields.push((key, vec![value])),
        }
    }

    /// Append `value` to the values of `key`
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => self.fields[index].1.push(value),
            None => self.fields.push((key, vec![value])),
        }
    }

    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.position(key)
            .map(|index| self.fields[index].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Flattened `(key, value)` pairs, one per value
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this form carrying `screen_id` as its screenId, placed first
    pub fn with_screen_id(&self, screen_id: &str) -> Self {
        let mut stamped = Self::new();
        stamped.set(SCREEN_ID_FIELD, screen_id);
        for (key, values) in self.fields() {
            if key == SCREEN_ID_FIELD {
                continue;
            }
            for value in values {
                stamped.add(key, value.as_str());
            }
        }
        stamped
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnswerForm {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (key, value) in iter {
            form.add(key, value);
        }
        form
    }
}
