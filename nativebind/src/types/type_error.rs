#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("Unknown type `{0}`")]
    UnknownType(String),
    #[error("Type `{0}` is not a struct or union and cannot be passed by value")]
    NotAStruct(String),
    #[error("Failed to resolve callback signature")]
    Callback,
}
