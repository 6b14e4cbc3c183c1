/// Normalize an emote identifier to its bare display name.
///
/// Inventories and peers may carry decorated ids (a path, a file extension,
/// an `emote_` prefix); display and wire transmission always use the bare
/// name so both sides resolve the same asset.
pub fn normalize_emote_id(id: &str) -> String {
    let mut name = id;

    if let Some(slash) = name.rfind('/') {
        name = &name[slash + 1..];
    }
    if let Some(dot) = name.rfind('.') {
        if dot > 0 {
            name = &name[..dot];
        }
    }
    name.strip_prefix("emote_").unwrap_or(name).to_string()
}
