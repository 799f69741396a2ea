//! AST Invariant Tests
//!
//! Structural round-trip invariants:
//! - A record AST resolves to the identical type while the type lives
//! - Resolving after the type is reclaimed fails with RecycledType
//! - An injected liveness predicate decides reclamation deterministically
//! - Non-record nodes are malformed input for from_ast

use aerostruct::compiler::TypeRef;
use aerostruct::types;
use aerostruct::{
    Ast, Compiler, FieldType, RecordType, Scope, StructError, UnionOptions, UnionResolver,
};

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_round_trip_identity() {
    let user = RecordType::define("User");
    user.attribute("name", types::string()).unwrap();
    user.nested_attribute("address", None, |a| {
        a.attribute("city", types::string()).map(|_| ())
    })
    .unwrap();

    let ast = user.to_ast();
    assert_eq!(ast.tag(), "record");

    for _ in 0..10 {
        let back = RecordType::from_ast(&ast).unwrap();
        assert!(back.ptr_eq(&user));
    }
}

#[test]
fn test_round_trip_through_subtype_ast() {
    let base = RecordType::define("Base");
    let child = base.subtype("Child");

    let back = RecordType::from_ast(&child.to_ast()).unwrap();
    assert!(back.ptr_eq(&child));
    assert!(!back.ptr_eq(&base));
}

#[test]
fn test_ast_equality_tracks_identity() {
    let a = RecordType::define("Same");
    let b = RecordType::define("Same");

    assert_eq!(a.to_ast(), a.to_ast());
    assert_ne!(a.to_ast(), b.to_ast());
}

// =============================================================================
// Reclamation Tests
// =============================================================================

#[test]
fn test_recycled_after_drop() {
    let ast = {
        let temp = RecordType::define("Temporary");
        temp.attribute("id", types::integer()).unwrap();
        let ast = temp.to_ast();
        assert!(RecordType::from_ast(&ast).is_ok());
        ast
    };

    let err = RecordType::from_ast(&ast).unwrap_err();
    assert!(matches!(err, StructError::RecycledType { ref name } if name == "Temporary"));
    assert!(!matches!(err, StructError::MalformedAst { .. }));
}

#[test]
fn test_subtype_reclaimed_while_parent_lives() {
    let parent = RecordType::define("Parent");
    let ast = parent.subtype("Ephemeral").to_ast();

    assert!(matches!(
        RecordType::from_ast(&ast),
        Err(StructError::RecycledType { .. })
    ));
    assert!(parent.subtypes().is_empty());
    assert!(RecordType::from_ast(&parent.to_ast()).is_ok());
}

#[test]
fn test_injected_liveness_predicate() {
    let keep = RecordType::define("Keep");
    let drop_me = RecordType::define("DropMe");

    let compiler = Compiler::with_liveness(|r: &TypeRef| r.name() != "DropMe");

    assert!(compiler.from_ast(&keep.to_ast()).unwrap().ptr_eq(&keep));
    let err = compiler.from_ast(&drop_me.to_ast()).unwrap_err();
    assert_eq!(err.code(), "AERO_STRUCT_RECYCLED_TYPE");
}

#[test]
fn test_recycled_scope_node() {
    let ast = {
        let scope = Scope::new("Gone");
        UnionResolver::bind(&scope, UnionOptions::new()).unwrap();
        scope.to_ast()
    };

    assert_eq!(ast.tag(), "scope");
    let err = Compiler::new().visit(&ast).unwrap_err();
    assert!(matches!(err, StructError::RecycledType { ref name } if name == "Gone"));
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_non_record_nodes_are_malformed() {
    let nodes = vec![
        types::string().to_ast(),
        types::array_of(types::integer()).to_ast(),
        Ast::Nominal {
            name: "integer".into(),
        },
    ];

    for node in &nodes {
        let err = RecordType::from_ast(node).unwrap_err();
        assert!(matches!(err, StructError::MalformedAst { .. }), "{}", node.tag());
    }
}

#[test]
fn test_schema_node_is_not_a_field_type() {
    let user = RecordType::define("User");
    user.attribute("name", types::string()).unwrap();

    let schema_node = match user.to_ast() {
        Ast::Record { schema, .. } => *schema,
        other => panic!("unexpected node {}", other.tag()),
    };
    assert_eq!(schema_node.tag(), "schema");

    let err = Compiler::new().visit(&schema_node).unwrap_err();
    assert_eq!(err.code(), "AERO_STRUCT_MALFORMED_AST");
}

#[test]
fn test_unknown_nominal_name() {
    let err = Compiler::new()
        .visit(&Ast::Nominal {
            name: "decimal".into(),
        })
        .unwrap_err();
    assert_eq!(err.code(), "AERO_STRUCT_UNKNOWN_TYPE");
}
