/// The authenticated caller, as supplied by the auth collaborator.
///
/// The engine trusts this without re-validating; `organization_id` is the
/// tenant-isolation boundary applied to every read and write.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub organization_id: String,
    pub role: String,
}
