mod fields;
mod invite;

pub use fields::{parse_json_body, validate_body, validate_headers, FieldType, JsonBody};
pub use invite::{
    is_code_shaped, validate_discord_url, validate_vanity_code, CREATE_INVITE_FIELDS,
    INVITE_GATE_HEADERS, UPDATE_INVITE_FIELDS,
};
