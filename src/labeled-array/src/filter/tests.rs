// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::*;

fn inst<const N: usize>(pairs: [(&str, Value); N]) -> Instance {
    Instance::from(pairs)
}

fn check(filter: &str, instance: &Instance) -> bool {
    Filter::parse(filter).unwrap().matches(instance).unwrap()
}

fn parse_err(filter: &str) -> ErrorCode {
    let err = Filter::parse(filter).unwrap_err();
    assert_eq!(ErrorKind::Filter, err.kind, "{filter:?}");
    err.code
}

#[test]
fn test_display_simple() {
    let cases = [
        ("a < 3", "a < 3"),
        ("a==1", "a == 1"),
        ("c == 'c1'", "c == 'c1'"),
        ("a >= 2.5", "a >= 2.5"),
        ("a > -1", "a > -1"),
        ("exists(a)", "exists(a)"),
        ("a in [1, 2,3]", "a in [1, 2, 3]"),
        ("a not in []", "! a in []"),
        ("!a", "! a"),
        ("a =~ 'x.*'", "a =~ 'x.*'"),
    ];
    for (input, expected) in cases {
        assert_eq!(
            expected,
            Filter::parse(input).unwrap().to_string(),
            "{input:?}"
        );
    }
}

#[test]
fn test_multi_comparison() {
    let f = Filter::parse("1 < a < 3").unwrap();
    assert_eq!("1 < a && a < 3", f.to_string());
    let f = Filter::parse("1 < a < b < 3").unwrap();
    assert_eq!("1 < a && a < b && b < 3", f.to_string());

    let inside = inst([("a", 2.into()), ("b", Value::Float(2.5))]);
    let outside = inst([("a", 2.into()), ("b", 3.into())]);
    assert!(f.matches(&inside).unwrap());
    assert!(!f.matches(&outside).unwrap());
}

#[test]
fn test_and_combinator() {
    let f = Filter::parse("a < 3").unwrap();
    let g = f.and(&Filter::parse("b == 4").unwrap());
    assert_eq!("a < 3 && b == 4", g.to_string());
    let both = inst([("a", 2.into()), ("b", 4.into())]);
    let one = inst([("a", 3.into()), ("b", 4.into())]);
    assert!(g.matches(&both).unwrap());
    assert!(!g.matches(&one).unwrap());

    assert_eq!(f, Filter::all().and(&f));
    assert_eq!(f, f.and(&Filter::all()));
}

#[test]
fn test_from_instance() {
    let d = inst([("VAR1", 1.into()), ("VAR2", 2.into())]);
    let f1 = Filter::from_instance(&d);
    let f2 = Filter::parse("VAR1 == 1 && VAR2 == 2").unwrap();
    assert_eq!(f1.to_string(), f2.to_string());
    assert_eq!(Some(d), f2.as_instance());
    assert_eq!(None, Filter::parse("VAR1 < 1").unwrap().as_instance());
    assert_eq!(
        None,
        Filter::parse("a == 1 && a == 2").unwrap().as_instance()
    );
}

#[test]
fn test_membership() {
    assert!(check("VAR1 in [1, 3, 5]", &inst([("VAR1", 3.into())])));
    assert!(check("VAR1 not in [1, 3, 5]", &inst([("VAR1", 10.into())])));
    assert!(check("'b' in name", &inst([("name", "abc".into())])));
}

#[test]
fn test_pattern_binding() {
    let name = |s: &str| inst([("name", s.into())]);
    assert!(check("name =~ 'foo'", &name("foobar")));
    assert!(!check("name =~ 'foo'", &name("barfoo")));
    assert!(check("name !~ 'foo'", &name("barfoo")));
    assert!(check("size =~ '1'", &inst([("size", 12.into())])));
    assert_eq!(ErrorCode::InvalidRegex, parse_err("name =~ other"));
    assert_eq!(ErrorCode::InvalidRegex, parse_err("name =~ '('"));
}

#[test]
fn test_logical_associativity() {
    let i = inst([("a", 1.into()), ("b", 0.into()), ("c", 0.into())]);
    // (a || b) && c
    assert!(!check("a == 1 || b == 1 && c == 1", &i));
    assert!(check("a == 1 || (b == 1 && c == 1)", &i));
    assert!(check("!(b == 1) && a == 1", &i));
}

#[test]
fn test_arithmetic() {
    let i = inst([("a", 3.into())]);
    assert!(check("a % 2 == 1", &i));
    assert!(check("a * 2 + 1 == 7", &i));
    assert!(check("a / 2 == 1.5", &i));
    assert!(check("-a == -3", &i));
    assert!(check("a - 1 - 1 == 1", &i));
    assert_eq!(
        "(a - 1) - 1 == 1",
        Filter::parse("a - 1 - 1 == 1").unwrap().to_string()
    );
}

#[test]
fn test_bare_values() {
    assert!(check("flag", &inst([("flag", true.into())])));
    assert!(check("True", &Instance::new()));
    assert!(!check("False || False", &Instance::new()));
    assert!(check("exists(a) && ! exists(b)", &inst([("a", 1.into())])));
}

#[test]
fn test_missing_variables() {
    let f = Filter::parse("a == 1 && b == 2").unwrap();
    let i = inst([("a", 1.into())]);
    let err = f.matches(&i).unwrap_err();
    assert_eq!(ErrorCode::MissingVariable, err.code);
    assert!(!f.matches_lenient(&i).unwrap());
}

#[test]
fn test_validate() {
    let f = Filter::parse("a == 1 && exists(c)").unwrap();
    assert_eq!(vec!["a".to_string(), "c".to_string()], f.variables());
    assert!(f.validate(&["a", "b", "c"]).is_ok());
    let err = f.validate(&["a", "b"]).unwrap_err();
    assert_eq!(ErrorCode::UnallowedVariable, err.code);
    assert_eq!(Some("c".to_string()), f.first_unallowed(&["a"]));
}

#[test]
fn test_type_errors() {
    let f = Filter::parse("a < 3").unwrap();
    let err = f.matches(&inst([("a", "x".into())])).unwrap_err();
    assert_eq!(ErrorCode::TypeMismatch, err.code);
    // equality across types is simply false
    assert!(!check("a == 3", &inst([("a", "x".into())])));
}

#[test]
fn test_syntax_errors() {
    assert_eq!(ErrorCode::UnrecognizedEof, parse_err(""));
    assert_eq!(ErrorCode::UnrecognizedEof, parse_err("a =="));
    assert_eq!(ErrorCode::ExtraToken, parse_err("a == 1 )"));
    assert_eq!(ErrorCode::UnrecognizedToken, parse_err("a == == 1"));
    assert_eq!(ErrorCode::UnrecognizedToken, parse_err("a = 1"));
    assert_eq!(ErrorCode::UnclosedString, parse_err("a == 'x"));
    assert_eq!(ErrorCode::UnrecognizedToken, parse_err("exists(1)"));
    assert_eq!(ErrorCode::UnrecognizedEof, parse_err("a in [1, 2"));
}

#[test]
fn test_display_roundtrip() {
    let filters = [
        "a == 1 || b == 2 && c == 3",
        "a == 1 || (b == 2 && c == 3)",
        "!(a == 1 && b == 2)",
        "(a + 1) * 2 == 4",
        "1 <= a < 10 && name !~ 'tmp'",
        "a in [1, -2, 'x'] || exists(z)",
        "(a == 1) == True",
    ];
    for text in filters {
        let once = Filter::parse(text).unwrap();
        let twice = Filter::parse(&once.to_string()).unwrap();
        assert_eq!(once.to_string(), twice.to_string(), "{text:?}");
    }
}

#[test]
fn test_from_str() {
    let f: Filter = "a == 1".parse().unwrap();
    assert!(f.matches(&inst([("a", 1.into())])).unwrap());
    assert!("a ==".parse::<Filter>().is_err());
}
