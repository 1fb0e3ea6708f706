//! End-to-end tests for the header pipeline
//!
//! Each test feeds realistic header text through the public API and
//! checks the finalized store.

use hdrscan_core::{ArraySize, ParserConfig, TypeBase, TypeModifier, Value};
use hdrscan_parser::{cache, HeaderParser};

fn parse(text: &str) -> HeaderParser {
    let mut parser = HeaderParser::new();
    parser.add_source("test.h", text);
    parser.parse().expect("parse failed");
    parser
}

#[test]
fn test_conditional_inclusion_selects_branches() {
    let parser = parse(
        r#"
#define M
#if defined M
#define A 1
#endif
#if !defined N
#define B 2
#endif
"#,
    );
    let store = parser.store();
    assert!(store.macros.get("M").is_some());
    assert!(store.macros.get("A").is_some());
    assert!(store.macros.get("B").is_some());
    assert!(store.macros.get("N").is_none());
    assert_eq!(store.values.get("A"), Some(&Value::Int(1)));
    assert_eq!(store.values.get("B"), Some(&Value::Int(2)));
}

#[test]
fn test_function_macro_expansion_reaches_initializer() {
    let parser = parse(
        r#"
#define BIT 0x01
#define SETBIT(x,b) ((x) |= (b))
#define SETBITS(x,y) (SETBIT(x, BIT), SETBIT(y, BIT))
int z = SETBITS(1,2);
"#,
    );
    let store = parser.store();
    assert!(store.fnmacros.get("SETBIT").is_some());
    assert!(store.fnmacros.get("SETBITS").is_some());

    let z = store.variables.get("z").expect("z recorded");
    match z.value.as_ref().expect("initializer kept") {
        Value::Symbolic(tokens) => {
            let rendered = hdrscan_core::token::render(tokens);
            assert!(
                rendered.contains("((1) |= (0x01)), ((2) |= (0x01))"),
                "unexpected expansion: {}",
                rendered
            );
        }
        other => panic!("expected symbolic initializer, got {:?}", other),
    }
}

#[test]
fn test_enum_with_expression_values() {
    let parser = parse(
        r#"
#define V 128
enum E { a=(V|1), b=6, c, d };
"#,
    );
    let store = parser.store();
    let e = store.enums.get("E").expect("enum E");
    assert_eq!(
        e.members,
        vec![
            ("a".to_string(), 129),
            ("b".to_string(), 6),
            ("c".to_string(), 7),
            ("d".to_string(), 8),
        ]
    );
    for (name, value) in &[("a", 129i64), ("b", 6), ("c", 7), ("d", 8)] {
        assert_eq!(store.values.get(name), Some(&Value::Int(*value)));
    }
}

#[test]
fn test_enum_members_reference_earlier_members() {
    let parser = parse("enum seq { first = 5, second = first + 10, third };\n");
    let e = parser.store().enums.get("seq").unwrap();
    assert_eq!(e.members[1], ("second".to_string(), 15));
    assert_eq!(e.members[2], ("third".to_string(), 16));
}

#[test]
fn test_pragma_pack_attaches_to_struct() {
    let parser = parse(
        r#"
#pragma pack()
#pragma pack(4)
#pragma pack(push, r1, 16)
#pragma pack(pop)
struct S { int x; };
struct T { int y; };
"#,
    );
    let store = parser.store();
    assert_eq!(store.structs.get("S").unwrap().pack, Some(4));
    assert_eq!(store.structs.get("S").unwrap().pack_value(), 4);
    assert_eq!(store.structs.get("T").unwrap().pack, Some(4));
}

#[test]
fn test_struct_before_pragma_uses_default_pack() {
    let parser = parse("struct P { int x; };\n#pragma pack(2)\nstruct Q { int y; };\n");
    let store = parser.store();
    assert_eq!(store.structs.get("P").unwrap().pack, None);
    assert_eq!(store.structs.get("P").unwrap().pack_value(), 8);
    assert_eq!(store.structs.get("Q").unwrap().pack, Some(2));
}

#[test]
fn test_declarator_precedence() {
    let parser = parse("int (*prec_ptr_of_arr)[1], *(prec_arr_of_ptr[1]);\n");
    let store = parser.store();

    let first = store.variables.get("prec_ptr_of_arr").expect("first var");
    assert_eq!(first.ty.base, TypeBase::Primitive("int".into()));
    assert_eq!(
        first.ty.modifiers,
        vec![
            TypeModifier::Array(ArraySize::Fixed(1)),
            TypeModifier::Pointer
        ]
    );

    let second = store.variables.get("prec_arr_of_ptr").expect("second var");
    assert_eq!(second.ty.base, TypeBase::Primitive("int".into()));
    assert_eq!(
        second.ty.modifiers,
        vec![
            TypeModifier::Pointer,
            TypeModifier::Array(ArraySize::Fixed(1))
        ]
    );
}

#[test]
fn test_typedef_chain_resolution() {
    let parser = parse(
        r#"
typedef int type_int;
typedef type_int type_type_int;
type_type_int y;
"#,
    );
    let store = parser.store();
    let y = store.variables.get("y").unwrap();
    let resolved = store.resolve(&y.ty).unwrap();
    assert_eq!(resolved.base, TypeBase::Primitive("int".into()));
    assert!(resolved.modifiers.is_empty());
}

#[test]
fn test_multiple_declarators_share_base() {
    let parser = parse("unsigned long d1, *d2, d3[3];\n");
    let store = parser.store();
    for name in ["d1", "d2", "d3"] {
        let var = store.variables.get(name).unwrap();
        assert_eq!(var.ty.base, TypeBase::Primitive("unsigned long".into()));
    }
    assert!(store.variables.get("d1").unwrap().ty.modifiers.is_empty());
    assert_eq!(
        store.variables.get("d2").unwrap().ty.modifiers,
        vec![TypeModifier::Pointer]
    );
    assert_eq!(
        store.variables.get("d3").unwrap().ty.modifiers,
        vec![TypeModifier::Array(ArraySize::Fixed(3))]
    );
}

#[test]
fn test_macro_value_reduction() {
    let parser = parse(
        r#"
#define MACRO_D1 1
#define MACRO_SD3 (3UL << 3)
#define MACRO_H3 0X000002UL
#define MACRO_F2 1.1e1
#define MACRO_S "test"
#define N n
#define MACRO 1
#define MACRO2 2
#define MACRO_ML MACRO\
                  *MACRO2
"#,
    );
    let store = parser.store();
    assert_eq!(store.values.get("MACRO_D1"), Some(&Value::Int(1)));
    assert_eq!(store.values.get("MACRO_SD3"), Some(&Value::Int(24)));
    assert_eq!(store.values.get("MACRO_H3"), Some(&Value::Int(2)));
    assert_eq!(store.values.get("MACRO_F2"), Some(&Value::Float(11.0)));
    assert_eq!(store.values.get("MACRO_S"), Some(&Value::Str("test".into())));
    // multi-line macro spliced, then reduced: 1 * 2
    assert_eq!(store.values.get("MACRO_ML"), Some(&Value::Int(2)));
    // 'n' does not reduce
    assert!(store.values.get("N").unwrap().is_symbolic());
}

#[test]
fn test_macro_redefinition_yields_new_value() {
    let parser = parse("#define X 1\n#define X 2\n");
    assert_eq!(parser.store().values.get("X"), Some(&Value::Int(2)));
    assert_eq!(parser.store().eval("X"), Some(Value::Int(2)));
}

#[test]
fn test_struct_with_bit_fields_and_defaults() {
    let parser = parse(
        r#"
struct flags {
    unsigned int a : 1;
    unsigned int b : 3;
    int : 2;
    int normal = 1;
};
"#,
    );
    let record = parser.store().structs.get("flags").unwrap();
    assert_eq!(record.fields.len(), 4);
    assert_eq!(record.fields[0].bit_width, Some(1));
    assert_eq!(record.fields[1].bit_width, Some(3));
    assert_eq!(record.fields[2].name, None);
    assert_eq!(record.fields[2].bit_width, Some(2));
    assert_eq!(record.fields[3].default, Some(Value::Int(1)));
}

#[test]
fn test_anonymous_nested_aggregates() {
    let parser = parse(
        r#"
struct outer {
    int leading;
    struct {
        int a;
        int b;
    };
    union {
        int raw;
        float flt;
    } viewer;
};
"#,
    );
    let store = parser.store();
    let outer = store.structs.get("outer").unwrap();
    assert_eq!(outer.fields.len(), 3);

    // the anonymous struct contributes one unnamed field referencing an
    // inline record that holds the actual members
    let anon = &outer.fields[1];
    assert_eq!(anon.name, None);
    match &anon.ty.base {
        TypeBase::Struct(id) => {
            let inner = store.structs.get(id).unwrap();
            assert_eq!(inner.fields.len(), 2);
            assert!(id.starts_with("anon_struct"));
        }
        other => panic!("expected inline struct, got {:?}", other),
    }

    let named_union = &outer.fields[2];
    assert_eq!(named_union.name.as_deref(), Some("viewer"));
    match &named_union.ty.base {
        TypeBase::Union(id) => {
            assert_eq!(store.unions.get(id).unwrap().fields.len(), 2);
        }
        other => panic!("expected inline union, got {:?}", other),
    }
}

#[test]
fn test_function_prototypes() {
    let parser = parse(
        r#"
int plain(int a, char *b);
int __stdcall with_conv(void);
extern int printf(const char *fmt, ...);
typedef int (*callback)(void *ctx, int event);
callback install_handler(callback handler);
"#,
    );
    let store = parser.store();

    let plain = store.functions.get("plain").unwrap();
    assert_eq!(plain.params.len(), 2);
    assert_eq!(plain.params[0].name.as_deref(), Some("a"));
    assert!(!plain.variadic);
    assert_eq!(plain.return_type.base, TypeBase::Primitive("int".into()));

    let with_conv = store.functions.get("with_conv").unwrap();
    assert_eq!(with_conv.call_conv.as_deref(), Some("__stdcall"));
    assert!(with_conv.params.is_empty());

    let printf = store.functions.get("printf").unwrap();
    assert!(printf.variadic);
    assert_eq!(printf.storage, vec!["extern".to_string()]);

    let cb = store.types.get("callback").unwrap();
    assert!(matches!(
        cb.modifiers.as_slice(),
        [TypeModifier::Function(_), TypeModifier::Pointer]
    ));

    let install = store.functions.get("install_handler").unwrap();
    assert_eq!(install.return_type.base, TypeBase::Named("callback".into()));
}

#[test]
fn test_inline_function_body_is_skipped() {
    let parser = parse(
        r#"
static inline int square(int x) { return x * x; }
int after;
"#,
    );
    let store = parser.store();
    assert!(store.functions.get("square").is_some());
    assert!(store.variables.get("after").is_some());
}

#[test]
fn test_unknown_type_names_are_tolerated() {
    let parser = parse("someType X;\nsomeType *ptr_x;\n");
    let store = parser.store();
    assert_eq!(
        store.variables.get("X").unwrap().ty.base,
        TypeBase::Named("someType".into())
    );
    assert_eq!(
        store.variables.get("ptr_x").unwrap().ty.modifiers,
        vec![TypeModifier::Pointer]
    );
}

#[test]
fn test_syntax_error_skips_to_next_declaration() {
    let mut parser = HeaderParser::new();
    parser.add_source(
        "test.h",
        "int ok_before;\nint &&& broken |||;\nint ok_after;\n",
    );
    parser.parse().unwrap();
    let store = parser.store();
    assert!(store.variables.get("ok_before").is_some());
    assert!(store.variables.get("ok_after").is_some());
    assert!(!parser.diagnostics().is_empty());
}

#[test]
fn test_variable_initializers() {
    let parser = parse(
        r#"
#define SIZE 4
int counter = 10;
int table[SIZE] = {1, 2, 3, 4};
char *greeting = "hello" " " "world";
float ratio = 1.5;
"#,
    );
    let store = parser.store();
    assert_eq!(
        store.variables.get("counter").unwrap().value,
        Some(Value::Int(10))
    );
    let table_var = store.variables.get("table").unwrap();
    assert_eq!(
        table_var.ty.modifiers,
        vec![TypeModifier::Array(ArraySize::Fixed(4))]
    );
    assert_eq!(
        table_var.value,
        Some(Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4)
        ]))
    );
    assert_eq!(
        store.variables.get("greeting").unwrap().value,
        Some(Value::Str("hello world".into()))
    );
    assert_eq!(
        store.variables.get("ratio").unwrap().value,
        Some(Value::Float(1.5))
    );
}

#[test]
fn test_struct_field_types_resolve() {
    let parser = parse(
        r#"
typedef unsigned int u32;
struct device {
    u32 id;
    struct device *next;
};
"#,
    );
    let store = parser.store();
    let device = store.structs.get("device").unwrap();
    let id_resolved = store.resolve(&device.fields[0].ty).unwrap();
    assert_eq!(id_resolved.base, TypeBase::Primitive("unsigned int".into()));
    // self-referential pointer stays a name/id reference
    assert_eq!(device.fields[1].ty.modifiers, vec![TypeModifier::Pointer]);
}

#[test]
fn test_typedef_cycle_warns_but_parses() {
    let mut parser = HeaderParser::new();
    parser.add_source("test.h", "typedef A B;\ntypedef B A;\nint ok;\n");
    parser.parse().unwrap();
    assert!(parser.store().variables.get("ok").is_some());
    assert!(parser
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("recursive typedef")));
    // raw chain is still stored
    assert!(parser.store().types.get("B").is_some());
}

#[test]
fn test_cache_roundtrip_preserves_store() {
    let source = r#"
#define LIMIT (1 << 8)
typedef unsigned short u16;
enum color { red, green = 5, blue };
struct point { u16 x; u16 y; };
int origin[2] = {0, 0};
int distance(struct point *a, struct point *b);
"#;
    let cache_path = std::env::temp_dir().join(format!(
        "hdrscan-headers-test-{}.cache",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&cache_path);

    let mut first = HeaderParser::new();
    first.add_source("test.h", source);
    let original = first.process_all(Some(&cache_path)).unwrap().clone();
    assert!(cache_path.is_file());

    // same inputs and config: the cache must hit and reproduce the store
    let mut second = HeaderParser::new();
    second.add_source("test.h", source);
    let reloaded = second.process_all(Some(&cache_path)).unwrap().clone();
    assert_eq!(original, reloaded);

    // changed input: the cache must miss and be rewritten
    let mut third = HeaderParser::new();
    third.add_source("test.h", "int different;\n");
    let other = third.process_all(Some(&cache_path)).unwrap();
    assert!(other.variables.get("different").is_some());
    assert!(other.structs.get("point").is_none());

    let _ = std::fs::remove_file(&cache_path);
}

#[test]
fn test_cache_respects_config_fingerprint() {
    let mut custom = ParserConfig::default();
    custom.primitive_types.push("BOOL".into());
    assert_ne!(
        cache::hash_config(&ParserConfig::default()),
        cache::hash_config(&custom)
    );
}

#[test]
fn test_values_survive_cache() {
    let cache_path = std::env::temp_dir().join(format!(
        "hdrscan-values-test-{}.cache",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&cache_path);
    let source = "#define ANSWER 42\nenum tri { yes, no, maybe };\n";

    let mut first = HeaderParser::new();
    first.add_source("test.h", source);
    first.process_all(Some(&cache_path)).unwrap();

    let mut second = HeaderParser::new();
    second.add_source("test.h", source);
    let store = second.process_all(Some(&cache_path)).unwrap();
    assert_eq!(store.eval("ANSWER"), Some(Value::Int(42)));
    assert_eq!(store.values.get("maybe"), Some(&Value::Int(2)));

    let _ = std::fs::remove_file(&cache_path);
}

#[test]
fn test_near_far_modifiers_from_config() {
    let parser = parse("char far *video_mem;\n");
    let var = parser.store().variables.get("video_mem").unwrap();
    assert!(var.ty.quals.iter().any(|q| q == "far"));
    assert_eq!(var.ty.modifiers, vec![TypeModifier::Pointer]);
}

#[test]
fn test_replacement_table_strips_attributes() {
    let mut config = ParserConfig::default();
    config
        .replacements
        .push((r"__declspec\(\w+\)".to_string(), String::new()));
    let mut parser = HeaderParser::with_config(config);
    parser.add_source("test.h", "__declspec(dllexport) int exported(void);\n");
    parser.parse().unwrap();
    assert!(parser.store().functions.get("exported").is_some());
}
