//! 美国州名 / 州代码对照

use phf::phf_map;

/// 小写州名 → 州代码
static NAME_TO_CODE: phf::Map<&'static str, &'static str> = phf_map! {
    "alabama" => "AL", "alaska" => "AK", "arizona" => "AZ", "arkansas" => "AR",
    "california" => "CA", "colorado" => "CO", "connecticut" => "CT", "delaware" => "DE",
    "district of columbia" => "DC", "florida" => "FL", "georgia" => "GA", "hawaii" => "HI",
    "idaho" => "ID", "illinois" => "IL", "indiana" => "IN", "iowa" => "IA",
    "kansas" => "KS", "kentucky" => "KY", "louisiana" => "LA", "maine" => "ME",
    "maryland" => "MD", "massachusetts" => "MA", "michigan" => "MI", "minnesota" => "MN",
    "mississippi" => "MS", "missouri" => "MO", "montana" => "MT", "nebraska" => "NE",
    "nevada" => "NV", "new hampshire" => "NH", "new jersey" => "NJ", "new mexico" => "NM",
    "new york" => "NY", "north carolina" => "NC", "north dakota" => "ND", "ohio" => "OH",
    "oklahoma" => "OK", "oregon" => "OR", "pennsylvania" => "PA", "rhode island" => "RI",
    "south carolina" => "SC", "south dakota" => "SD", "tennessee" => "TN", "texas" => "TX",
    "utah" => "UT", "vermont" => "VT", "virginia" => "VA", "washington" => "WA",
    "west virginia" => "WV", "wisconsin" => "WI", "wyoming" => "WY",
};

/// 州代码 → 小写州名
static CODE_TO_NAME: phf::Map<&'static str, &'static str> = phf_map! {
    "AL" => "alabama", "AK" => "alaska", "AZ" => "arizona", "AR" => "arkansas",
    "CA" => "california", "CO" => "colorado", "CT" => "connecticut", "DE" => "delaware",
    "DC" => "district of columbia", "FL" => "florida", "GA" => "georgia", "HI" => "hawaii",
    "ID" => "idaho", "IL" => "illinois", "IN" => "indiana", "IA" => "iowa",
    "KS" => "kansas", "KY" => "kentucky", "LA" => "louisiana", "ME" => "maine",
    "MD" => "maryland", "MA" => "massachusetts", "MI" => "michigan", "MN" => "minnesota",
    "MS" => "mississippi", "MO" => "missouri", "MT" => "montana", "NE" => "nebraska",
    "NV" => "nevada", "NH" => "new hampshire", "NJ" => "new jersey", "NM" => "new mexico",
    "NY" => "new york", "NC" => "north carolina", "ND" => "north dakota", "OH" => "ohio",
    "OK" => "oklahoma", "OR" => "oregon", "PA" => "pennsylvania", "RI" => "rhode island",
    "SC" => "south carolina", "SD" => "south dakota", "TN" => "tennessee", "TX" => "texas",
    "UT" => "utah", "VT" => "vermont", "VA" => "virginia", "WA" => "washington",
    "WV" => "west virginia", "WI" => "wisconsin", "WY" => "wyoming",
};

/// 把州代码或州名统一成两位大写代码
///
/// 无法识别时返回 `None`
pub fn normalize_state(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    let upper = trimmed.to_ascii_uppercase();
    if let Some((code, _)) = CODE_TO_NAME.get_entry(upper.as_str()) {
        return Some(*code);
    }
    NAME_TO_CODE
        .get(trimmed.to_ascii_lowercase().as_str())
        .copied()
}

/// 州代码对应的小写州名
pub fn state_name(code: &str) -> Option<&'static str> {
    CODE_TO_NAME.get(code.to_ascii_uppercase().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state("oh"), Some("OH"));
        assert_eq!(normalize_state(" Ohio "), Some("OH"));
        assert_eq!(normalize_state("New York"), Some("NY"));
        assert_eq!(normalize_state("Atlantis"), None);
    }

    #[test]
    fn test_state_name() {
        assert_eq!(state_name("wa"), Some("washington"));
        assert_eq!(state_name("XX"), None);
    }
}
