#[test]
fn hearth_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/hearth_error_pass.rs");
}
