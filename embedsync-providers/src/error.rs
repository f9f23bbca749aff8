use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("origin {origin} already registered by provider {existing} (incoming: {incoming})")]
    OriginConflict {
        origin: String,
        existing: String,
        incoming: String,
    },
}
