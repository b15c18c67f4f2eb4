use crate::core::{RequestError, Result};
use crate::model::{DeclaredType, EntityShape, Model};
use std::collections::HashSet;

/// A single declared field with one level of optionality unwrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub declared_type: DeclaredType,
    pub is_optional: bool,
}

/// Introspection result for an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: String,
    pub identity_field: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeInfo {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

pub fn introspect<M: Model>() -> Result<TypeInfo> {
    describe(M::TYPE_NAME, M::ID_FIELD, M::entity_shape())
}

/// Normalizes a declared entity shape into a [`TypeInfo`].
pub fn describe(type_name: &str, identity_field: &str, shape: EntityShape) -> Result<TypeInfo> {
    let shapes = match shape {
        EntityShape::Keyed(shapes) => shapes,
        EntityShape::Unkeyed | EntityShape::Single(_) => {
            return Err(RequestError::table_creation(format!(
                "Can only save a struct to the database, {} is not a struct",
                type_name
            )));
        }
    };

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(shapes.len());
    for shape in shapes {
        if !seen.insert(shape.name) {
            return Err(RequestError::codable_decoding(format!(
                "{} declares field '{}' more than once",
                type_name, shape.name
            )));
        }

        let (declared_type, is_optional) = match shape.declared {
            DeclaredType::Optional(inner) => match *inner {
                DeclaredType::Optional(_) => {
                    return Err(RequestError::codable_decoding(format!(
                        "Cannot classify nested optional type of field '{}' in {}",
                        shape.name, type_name
                    )));
                }
                inner => (inner, true),
            },
            declared => (declared, false),
        };

        fields.push(FieldDescriptor {
            name: shape.name.to_string(),
            declared_type,
            is_optional,
        });
    }

    Ok(TypeInfo {
        type_name: type_name.to_string(),
        identity_field: identity_field.to_string(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::model::FieldShape;

    fn optional(inner: DeclaredType) -> DeclaredType {
        DeclaredType::Optional(Box::new(inner))
    }

    #[test]
    fn unwraps_one_level_of_optionality() {
        let info = describe(
            "Person",
            "id",
            EntityShape::Keyed(vec![
                FieldShape::new("id", optional(DeclaredType::Int64)),
                FieldShape::new("name", DeclaredType::String),
                FieldShape::new("nickname", optional(DeclaredType::String)),
            ]),
        )
        .unwrap();

        assert_eq!(info.type_name, "Person");
        assert_eq!(info.fields.len(), 3);
        assert_eq!(info.fields[0].declared_type, DeclaredType::Int64);
        assert!(info.fields[0].is_optional);
        assert!(!info.fields[1].is_optional);
        assert_eq!(info.field("nickname").unwrap().declared_type, DeclaredType::String);
    }

    #[test]
    fn rejects_nested_optionals() {
        let err = describe(
            "Person",
            "id",
            EntityShape::Keyed(vec![FieldShape::new(
                "nickname",
                optional(optional(DeclaredType::String)),
            )]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CodableDecodingError);
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let err = describe(
            "Person",
            "id",
            EntityShape::Keyed(vec![
                FieldShape::new("name", DeclaredType::String),
                FieldShape::new("name", DeclaredType::String),
            ]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CodableDecodingError);
    }

    #[test]
    fn rejects_non_record_shapes() {
        let err = describe("Tags", "id", EntityShape::Unkeyed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableCreationError);

        let err = describe("Score", "id", EntityShape::Single(DeclaredType::Int64)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableCreationError);
    }
}
