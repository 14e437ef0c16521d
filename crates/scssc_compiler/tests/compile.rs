//! End-to-end compilations: one literal input/output pair per behavior.

use scssc_compiler::Compiler;
use scssc_config::Config;

fn pretty() -> Compiler {
    let mut compiler = Compiler::new(Config::default());
    compiler.set_option("compress", 0);
    compiler
}

fn check(input: &str, expected: &str) {
    let css = pretty().compile_string(input).unwrap();
    assert_eq!(css, expected, "input: {input}");
}

fn check_compressed(input: &str, expected: &str) {
    let mut compiler = Compiler::new(Config::default());
    let css = compiler.compile_string(input).unwrap();
    assert_eq!(css, expected, "input: {input}");
}

#[test]
fn variable_color() {
    check("$c: #f00; a { color: $c; }", "a {\n  color: red;\n}\n");
}

#[test]
fn simple_nesting() {
    check(".a { .b { color: red; } }", ".a .b {\n  color: red;\n}\n");
}

#[test]
fn mixin_with_default() {
    check(
        "@mixin m($x: 1) { w: $x*2; } .a { @include m(3); }",
        ".a {\n  w: 6;\n}\n",
    );
}

#[test]
fn extend_splits_rules() {
    check(
        ".base { color: blue; } .sp { @extend .base; font: bold; }",
        ".base, .sp {\n  color: blue;\n}\n.sp {\n  font: bold;\n}\n",
    );
}

#[test]
fn for_loop_with_interpolation() {
    check(
        "@for $i from 1 through 3 { .a#{$i} { z: $i; } }",
        ".a1 {\n  z: 1;\n}\n.a2 {\n  z: 2;\n}\n.a3 {\n  z: 3;\n}\n",
    );
}

#[test]
fn arithmetic_and_mix() {
    check(
        ".x { a: 1px + 2px; b: mix(#f00, #00f); }",
        ".x {\n  a: 3px;\n  b: #7f007f;\n}\n",
    );
}

#[test]
fn for_loop_exclusive_to() {
    check(
        "@for $i from 1 to 3 { .a#{$i} { z: $i; } }",
        ".a1 {\n  z: 1;\n}\n.a2 {\n  z: 2;\n}\n",
    );
}

#[test]
fn nesting_is_associative() {
    let nested = pretty()
        .compile_string("a { b { c { x: 1; } } }")
        .unwrap();
    let flat = pretty().compile_string("a b c { x: 1; }").unwrap();
    assert_eq!(nested, flat);
    assert_eq!(nested, "a b c {\n  x: 1;\n}\n");
}

#[test]
fn parent_reference() {
    check(
        "a { &:hover { color: #f00; } }",
        "a:hover {\n  color: red;\n}\n",
    );
}

#[test]
fn unit_closure_through_properties() {
    check("a { w: 1px + 2em - 2em; }", "a {\n  w: 1px;\n}\n");
}

#[test]
fn nested_properties_scope() {
    check(
        "a { font: { family: serif; size: 12px; } }",
        "a {\n  font-family: serif;\n  font-size: 12px;\n}\n",
    );
}

#[test]
fn media_blocks() {
    check(
        "@media screen { a { color: #f00; } }",
        "@media screen {\n  a {\n    color: red;\n  }\n}\n",
    );
}

#[test]
fn if_else_chain() {
    check(
        "@if false { a { c: 1; } } @else { b { c: 2; } }",
        "b {\n  c: 2;\n}\n",
    );
    check(
        "@if 1 > 2 { a { c: 1; } } @else if 2 > 1 { b { c: 2; } } @else { i { c: 3; } }",
        "b {\n  c: 2;\n}\n",
    );
}

#[test]
fn each_over_list() {
    check(
        "$lst: join(a, b);\n@each $v in $lst { .#{$v} { m: 1; } }",
        ".a {\n  m: 1;\n}\n.b {\n  m: 1;\n}\n",
    );
}

#[test]
fn content_block_splices() {
    check(
        "@mixin wrap { .inner { @content; } } @include wrap { color: #f00; }",
        ".inner {\n  color: red;\n}\n",
    );
}

#[test]
fn user_function_return() {
    check(
        "@function double($n) { @return $n * 2; } a { w: double(21); }",
        "a {\n  w: 42;\n}\n",
    );
}

#[test]
fn default_assignment_semantics() {
    check(
        "$x: 1; $x: 2 !default; a { v: $x; }",
        "a {\n  v: 1;\n}\n",
    );
    check("$x: 2 !default; a { v: $x; }", "a {\n  v: 2;\n}\n");
}

#[test]
fn extend_is_transitive() {
    check(
        ".a { c: 1; } .b { @extend .a; d: 2; } .c { @extend .b; e: 3; }",
        ".a, .b, .c {\n  c: 1;\n}\n.b, .c {\n  d: 2;\n}\n.c {\n  e: 3;\n}\n",
    );
}

#[test]
fn placeholder_selectors_are_suppressed() {
    check(
        "%ph { c: 1; } .x { @extend %ph; }",
        ".x {\n  c: 1;\n}\n",
    );
}

#[test]
fn import_from_file_store() {
    let mut compiler = pretty();
    compiler.add_file(
        "library",
        "$col: #00f;\n@mixin deco() { font: bold; }",
    );
    let css = compiler
        .compile_string("@import \"library\";\na { color: $col; @include deco(); }")
        .unwrap();
    assert_eq!(css, "a {\n  color: blue;\n  font: bold;\n}\n");
}

#[test]
fn import_guard_is_idempotent() {
    let once = {
        let mut compiler = pretty();
        compiler.add_file("library", "@mixin deco() { font: bold; }");
        compiler
            .compile_string("@import \"library\";\na { @include deco(); }")
            .unwrap()
    };
    let twice = {
        let mut compiler = pretty();
        compiler.add_file("library", "@mixin deco() { font: bold; }");
        compiler
            .compile_string("@import \"library\";\n@import \"library\";\na { @include deco(); }")
            .unwrap()
    };
    assert_eq!(once, twice);
}

#[test]
fn missing_import_is_dropped() {
    check("@import \"nowhere\";\na { c: 1; }", "a {\n  c: 1;\n}\n");
}

#[test]
fn unknown_function_passes_through() {
    check(
        "a { filter: whatever(1, 2); }",
        "a {\n  filter: whatever(1, 2);\n}\n",
    );
    check(
        "a { background: url(img.png); }",
        "a {\n  background: url(img.png);\n}\n",
    );
}

#[test]
fn quoted_strings_keep_unsafe_chars() {
    check(
        "a { content: \"hi: there; // ok\"; }",
        "a {\n  content: \"hi: there; // ok\";\n}\n",
    );
}

#[test]
fn comments_are_stripped() {
    check(
        "/* gone */ a { // tail\n  color: #f00; /* multi\n  line */ }",
        "a {\n  color: red;\n}\n",
    );
}

#[test]
fn conditional_function() {
    check("a { w: if(true, 1px, 2px); }", "a {\n  w: 1px;\n}\n");
    check("a { w: if(0, 1px, 2px); }", "a {\n  w: 2px;\n}\n");
}

#[test]
fn compressed_output() {
    check_compressed(
        "a { margin: 0px; padding: 0.5em; }",
        "a{margin:0;padding:.5em}",
    );
}

#[test]
fn compressed_short_colors() {
    check_compressed("a { color: #ff0044; }", "a{color:#f04}");
}

#[test]
fn compressed_keeps_percent_and_time_zeros() {
    check_compressed(
        "a { w: 0%; t: 0s; m: 0px; }",
        "a{w:0%;t:0s;m:0}",
    );
}

#[test]
fn compression_is_idempotent() {
    let mut compiler = Compiler::new(Config::default());
    let first = compiler
        .compile_string(".x { color: #ff0044; margin: 0px 1px; }")
        .unwrap();
    let mut again = Compiler::new(Config::default());
    let second = again.compile_string(&first).unwrap();
    assert_eq!(first, second);
}

#[test]
fn duplicate_declarations_collapse() {
    check(
        "a { color: #f00; color: #f00; }",
        "a {\n  color: red;\n}\n",
    );
}

#[test]
fn multiple_files_get_banners() {
    let mut compiler = pretty();
    compiler.add_file("one.scss", "a { c: 1; }");
    compiler.add_file("two.scss", "b { d: 2; }");
    let css = compiler.compile().unwrap();
    assert_eq!(
        css,
        "/* Generated from: one.scss */\na {\n  c: 1;\n}\n/* Generated from: two.scss */\nb {\n  d: 2;\n}\n"
    );
}
