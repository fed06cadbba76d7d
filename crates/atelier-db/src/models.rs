/// Database row types. These map directly to SQLite rows and stay
/// independent of the tree models in atelier-types.

pub struct IdentityRow {
    pub uid: String,
    pub email: String,
    pub created_at: String,
}

pub struct NodeRow {
    pub root: String,
    pub body: String,
    pub updated_at: String,
}
