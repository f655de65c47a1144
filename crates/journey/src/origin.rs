/// Tags an export with the tenant and realm it came from: the hex MD5 of the
/// two strings concatenated. Used for uniqueness, not security.
pub fn origin_fingerprint(tenant: &str, realm: &str) -> String {
    let digest = md5::compute(format!("{}{}", tenant, realm));
    hex::encode(digest.0)
}
