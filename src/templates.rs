pub const LANGUAGE_CODES_JSON: &str = include_str!("../data/language_codes.json");
