//! Ownership and mode policy for materialized stacks

use std::path::Path;

pub const STACK_DIR_MODE: u32 = 0o750;
pub const VOLUME_DIR_MODE: u32 = 0o750;
pub const MANIFEST_MODE: u32 = 0o644;
pub const ENV_FILE_MODE: u32 = 0o600;

/// Resolved numeric owner; `None` leaves that half unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Ownership {
    pub fn is_empty(self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }
}

/// Numeric uid for a user name through the system user database (NSS). Numeric names are taken
/// as IDs directly.
#[cfg(unix)]
pub fn lookup_uid(name: &str) -> Result<Option<u32>, String> {
    if let Ok(id) = name.parse() {
        return Ok(Some(id));
    }
    nix::unistd::User::from_name(name)
        .map(|user| user.map(|u| u.uid.as_raw()))
        .map_err(|e| e.to_string())
}

/// Numeric gid for a group name, resolved like [`lookup_uid`].
#[cfg(unix)]
pub fn lookup_gid(name: &str) -> Result<Option<u32>, String> {
    if let Ok(id) = name.parse() {
        return Ok(Some(id));
    }
    nix::unistd::Group::from_name(name)
        .map(|group| group.map(|g| g.gid.as_raw()))
        .map_err(|e| e.to_string())
}

#[cfg(not(unix))]
pub fn lookup_uid(name: &str) -> Result<Option<u32>, String> {
    Ok(name.parse().ok())
}

#[cfg(not(unix))]
pub fn lookup_gid(name: &str) -> Result<Option<u32>, String> {
    Ok(name.parse().ok())
}

/// Resolve the configured user and group, collecting a warning for each name that cannot be
/// found.
pub fn resolve_ownership(
    user: Option<&str>,
    group: Option<&str>,
    warnings: &mut Vec<String>,
) -> Ownership {
    let mut resolve = |kind: &str, name: &str, lookup: fn(&str) -> Result<Option<u32>, String>| {
        match lookup(name) {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                warnings.push(format!("{kind} '{name}' not found; ownership left unchanged"));
                None
            }
            Err(e) => {
                warnings.push(format!("could not look up {kind} '{name}': {e}"));
                None
            }
        }
    };
    let uid = user.and_then(|u| resolve("user", u, lookup_uid));
    let gid = group.and_then(|g| resolve("group", g, lookup_gid));
    Ownership { uid, gid }
}

#[cfg(unix)]
pub async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
pub async fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
pub fn chown(path: &Path, ownership: Ownership) -> std::io::Result<()> {
    use nix::unistd::{Gid, Uid};
    nix::unistd::chown(
        path,
        ownership.uid.map(Uid::from_raw),
        ownership.gid.map(Gid::from_raw),
    )
    .map_err(std::io::Error::from)
}

#[cfg(not(unix))]
pub fn chown(_path: &Path, _ownership: Ownership) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_names_are_ids() {
        assert_eq!(lookup_uid("1234"), Ok(Some(1234)));
        assert_eq!(lookup_gid("998"), Ok(Some(998)));
    }

    #[cfg(unix)]
    #[test]
    fn root_resolves_through_user_database() {
        assert_eq!(lookup_uid("root"), Ok(Some(0)));
    }

    #[test]
    fn unknown_names_warn_and_leave_ownership_unchanged() {
        let mut warnings = Vec::new();
        let ownership = resolve_ownership(
            Some("stackwiz-no-such-user"),
            Some("stackwiz-no-such-group"),
            &mut warnings,
        );
        assert!(ownership.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("user 'stackwiz-no-such-user'"));
        assert!(warnings[1].contains("group 'stackwiz-no-such-group'"));
    }

    #[test]
    fn unset_names_resolve_to_nothing() {
        let mut warnings = Vec::new();
        assert!(resolve_ownership(None, None, &mut warnings).is_empty());
        assert!(warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn chown_to_own_ids_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let ownership = Ownership {
            uid: Some(nix::unistd::Uid::current().as_raw()),
            gid: Some(nix::unistd::Gid::current().as_raw()),
        };
        chown(dir.path(), ownership).unwrap();
    }
}
