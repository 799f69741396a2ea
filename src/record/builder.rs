//! Nested record type synthesis
//!
//! Turns an inline attribute block into a record type registered inside the
//! enclosing type's namespace, e.g. `roles` on `User` becomes `User::Role`.

use super::inflector::{camelize, singularize};
use super::record_type::RecordType;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{StructError, StructResult};
use crate::types::{rewrap, unwrap_record_type, FieldTypeRef};

/// Synthesizes nested record types for one enclosing type
pub struct NestedTypeBuilder<'a> {
    owner: &'a RecordType,
}

impl<'a> NestedTypeBuilder<'a> {
    pub fn new(owner: &'a RecordType) -> Self {
        Self { owner }
    }

    /// Build the nested type for `field_name` and return the field type to
    /// declare, wrapped like `explicit` was.
    ///
    /// The parent of the new type is the record type found by unwrapping
    /// `explicit` through array and optional wrappers. Without one, the new
    /// type derives from the owner's nearest abstract type (or starts a new
    /// root) with an empty schema and the owner's policy and key transform.
    pub fn build<F>(
        &self,
        field_name: &str,
        explicit: Option<FieldTypeRef>,
        block: F,
    ) -> StructResult<FieldTypeRef>
    where
        F: FnOnce(&RecordType) -> StructResult<()>,
    {
        let type_name = self.type_name(field_name, explicit.as_ref());
        let qualified_name = format!("{}::{}", self.owner.display_name(), type_name);

        if self.owner.nested_type(&type_name).is_some() {
            return Err(StructError::NameCollision { qualified_name });
        }
        // Nothing is synthesized or registered for a field that cannot be declared
        self.owner.ensure_undeclared(field_name)?;

        let nested = match explicit.as_ref().and_then(unwrap_record_type) {
            Some(parent) => parent.subtype(qualified_name.as_str()),
            None => {
                let nested = match self.owner.abstract_class() {
                    Some(base) => base.subtype(qualified_name.as_str()),
                    None => RecordType::define(qualified_name.as_str()),
                };
                nested.reset_from(self.owner);
                nested
            }
        };

        block(&nested)?;
        self.owner.register_nested(&type_name, nested.clone())?;

        log_event_with_fields(
            Event::NestedTypeSynthesized,
            &[("type", &qualified_name), ("field", field_name)],
        );

        let built: FieldTypeRef = nested.into();
        Ok(match explicit {
            Some(template) => rewrap(&template, built),
            None => built,
        })
    }

    /// `permissions` declared as an array becomes `Permission`
    fn type_name(&self, field_name: &str, explicit: Option<&FieldTypeRef>) -> String {
        let is_array = explicit.map_or(false, |t| t.is_array_of().is_some());
        if is_array {
            camelize(&singularize(field_name))
        } else {
            camelize(field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConstructorPolicy;
    use crate::types;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn test_array_field_is_singularized() {
        let user = RecordType::define("User");
        user.nested_attribute("permissions", Some(types::array()), |p| {
            p.attribute("name", types::string())?;
            Ok(())
        })
        .unwrap();

        let nested = user.nested_type("Permission").unwrap();
        assert_eq!(nested.display_name(), "User::Permission");
        assert_eq!(
            user.schema().get("permissions").unwrap().field_type.name(),
            "array<User::Permission>"
        );
    }

    #[test]
    fn test_plain_field_is_not_singularized() {
        let user = RecordType::define("User");
        user.nested_attribute("settings", None, |_| Ok(())).unwrap();
        assert!(user.nested_type("Settings").is_some());
    }

    #[test]
    fn test_collision_in_own_namespace() {
        let user = RecordType::define("User");
        user.nested_attribute("address", None, |_| Ok(())).unwrap();

        let err = user
            .nested_attribute("address?", None, |_| Ok(()))
            .unwrap_err();
        match err {
            StructError::NameCollision { qualified_name } => {
                assert_eq!(qualified_name, "User::Address")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_sibling_namespaces_do_not_collide() {
        let user = RecordType::define("User");
        let company = RecordType::define("Company");
        user.nested_attribute("address", None, |_| Ok(())).unwrap();
        company.nested_attribute("address", None, |_| Ok(())).unwrap();

        let admin = user.subtype("Admin");
        admin.nested_attribute("profile", None, |_| Ok(())).unwrap();
        assert!(admin.nested_type("Profile").is_some());
        assert!(user.nested_type("Profile").is_none());
    }

    #[test]
    fn test_explicit_parent_is_unwrapped() {
        let base = RecordType::define("Entity");
        base.attribute("id", types::integer()).unwrap();

        let user = RecordType::define("User");
        user.nested_attribute(
            "roles",
            Some(types::array_of(base.clone().into())),
            |role| {
                role.attribute("name", types::string())?;
                Ok(())
            },
        )
        .unwrap();

        let role = user.nested_type("Role").unwrap();
        assert!(role.is_subtype_of(&base));
        assert_eq!(role.attribute_names(), vec!["id", "name"]);
    }

    #[test]
    fn test_optional_wrapper_is_kept() {
        let user = RecordType::define("User");
        user.nested_attribute("manager", Some(types::optional(types::any())), |m| {
            m.attribute("name", types::string())?;
            Ok(())
        })
        .unwrap();

        let record = user.call(json!({"manager": null})).unwrap();
        assert_eq!(record.get("manager").unwrap(), &Value::Nil);
    }

    #[test]
    fn test_default_base_is_abstract_ancestor_with_cleared_schema() {
        let base = RecordType::define("Base");
        base.make_abstract();
        base.attribute("id", types::integer()).unwrap();

        let user = base.subtype("User").with_policy(ConstructorPolicy::Strict);
        user.nested_attribute("address", None, |a| {
            a.attribute("city", types::string())?;
            Ok(())
        })
        .unwrap();

        let address = user.nested_type("Address").unwrap();
        assert!(address.is_subtype_of(&base));
        assert_eq!(address.attribute_names(), vec!["city"]);
        assert_eq!(address.policy(), ConstructorPolicy::Strict);
    }

    #[test]
    fn test_duplicate_field_registers_no_nested_type() {
        let user = RecordType::define("User");
        user.attribute("name", types::string()).unwrap();

        let mut block_ran = false;
        let err = user
            .nested_attribute("name", None, |_| {
                block_ran = true;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StructError::DuplicateField { ref field, .. } if field == "name"));
        assert!(!block_ran);
        assert!(user.nested_type("Name").is_none());

        user.nested_attribute("profile", None, |_| Ok(())).unwrap();
        assert_eq!(user.nested_types().len(), 1);
    }

    #[test]
    fn test_failed_block_registers_nothing() {
        let user = RecordType::define("User");
        let result = user.nested_attribute("address", None, |a| {
            a.attribute("city", types::string())?;
            a.attribute("city", types::string())?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(user.nested_type("Address").is_none());
        assert!(!user.has_attribute("address"));
    }
}
