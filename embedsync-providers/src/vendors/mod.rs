// Builtin vendor adapters.
//
// Adding a vendor means adding one module here and one registration in
// `ProviderRegistry::builtin` — the router never special-cases vendors.

pub mod videasy;
pub mod vidfast;
pub mod vidlink;
