use std::fmt;

use super::field::FieldType;

/// One entry of a tuple schema: a type plus an optional column name
#[derive(Debug, Clone)]
pub struct TdItem {
    pub field_type: FieldType,
    pub name: Option<String>,
}

impl TdItem {
    pub fn new(field_type: FieldType, name: Option<String>) -> Self {
        Self { field_type, name }
    }
}

/// Ordered schema of a tuple.
///
/// Equality is structural over the field types only; names are cosmetic.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    pub fn new(types: Vec<FieldType>, names: Vec<Option<String>>) -> Self {
        let mut names = names.into_iter();
        let items = types
            .into_iter()
            .map(|field_type| TdItem::new(field_type, names.next().flatten()))
            .collect();
        Self { items }
    }

    /// Schema with the given types and no column names
    pub fn from_types(types: Vec<FieldType>) -> Self {
        Self::new(types, Vec::new())
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, idx: usize) -> Option<FieldType> {
        self.items.get(idx).map(|item| item.field_type)
    }

    pub fn field_name(&self, idx: usize) -> Option<&str> {
        self.items.get(idx).and_then(|item| item.name.as_deref())
    }

    /// Find the index of the column with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    /// Serialized width of a tuple with this schema, in bytes
    pub fn byte_size(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.field_type.byte_size())
            .sum()
    }

    /// Concatenation of two schemas, as produced by a join
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut items = Vec::with_capacity(left.items.len() + right.items.len());
        items.extend(left.items.iter().cloned());
        items.extend(right.items.iter().cloned());
        TupleDesc { items }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", item.field_type, item.name.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(types: Vec<FieldType>, names: &[&str]) -> TupleDesc {
        TupleDesc::new(
            types,
            names.iter().map(|n| Some(n.to_string())).collect(),
        )
    }

    #[test]
    fn test_byte_size() {
        let desc = named(vec![FieldType::Int, FieldType::Int], &["a", "b"]);
        assert_eq!(desc.byte_size(), 8);

        let desc = named(vec![FieldType::Int, FieldType::Str], &["a", "b"]);
        assert_eq!(desc.byte_size(), 4 + FieldType::Str.byte_size());
    }

    #[test]
    fn test_equality_ignores_names() {
        let a = named(vec![FieldType::Int, FieldType::Str], &["x", "y"]);
        let b = named(vec![FieldType::Int, FieldType::Str], &["p", "q"]);
        let c = TupleDesc::from_types(vec![FieldType::Int, FieldType::Str]);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_equality_checks_types() {
        let a = TupleDesc::from_types(vec![FieldType::Int, FieldType::Str]);
        let b = TupleDesc::from_types(vec![FieldType::Int, FieldType::Int]);
        let c = TupleDesc::from_types(vec![FieldType::Int]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_index_of() {
        let desc = named(vec![FieldType::Int, FieldType::Str], &["id", "name"]);
        assert_eq!(desc.index_of("id"), Some(0));
        assert_eq!(desc.index_of("name"), Some(1));
        assert_eq!(desc.index_of("missing"), None);
    }

    #[test]
    fn test_merge() {
        let a = named(vec![FieldType::Int], &["id"]);
        let b = named(vec![FieldType::Str, FieldType::Int], &["name", "age"]);
        let merged = TupleDesc::merge(&a, &b);
        assert_eq!(merged.num_fields(), 3);
        assert_eq!(merged.field_type(0), Some(FieldType::Int));
        assert_eq!(merged.field_type(1), Some(FieldType::Str));
        assert_eq!(merged.field_name(2), Some("age"));
        assert_eq!(merged.byte_size(), a.byte_size() + b.byte_size());
    }
}
