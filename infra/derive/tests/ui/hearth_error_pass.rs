use hearth_derive::hearth_error;
use std::borrow::Cow;

#[hearth_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Unknown module{}: {module}", format_context(.context))]
    UnknownModule { module: String, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open() -> Result<String, DemoError> {
    std::fs::read_to_string("/definitely/missing").context("Reading demo file")
}

fn unknown() -> Result<(), DemoError> {
    Err(DemoError::UnknownModule { module: "lights".to_owned(), context: None })
}

fn main() {
    let err = open().unwrap_err();
    assert!(err.to_string().starts_with("IO error (Reading demo file)"));

    let err = unknown().context("routing").unwrap_err();
    assert_eq!(err.to_string(), "Unknown module (routing): lights");

    let err: DemoError = "boom".into();
    assert_eq!(err.to_string(), "Internal error: boom");
}
