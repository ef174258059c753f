//! JSON decoding without serde_json's nesting limit.
//!
//! Sub-routes nest to any depth, so a record the store wrote itself can be
//! deeper than 128 levels. Parsing grows the stack on demand instead.

use serde::Deserialize;
use serde_json::Value;
use tripkeep_domain::TripRecord;

/// Stack for typed decoding. Flattened fields buffer their subtree, which
/// recurses once per nesting level outside `serde_stacker`'s reach.
const DECODE_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Parses a whole buffer into a JSON tree. Trailing non-whitespace fails.
pub fn parse_document(bytes: &[u8]) -> serde_json::Result<Value> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let document = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(document)
}

/// Converts a migrated document into the typed record.
pub fn decode_record(document: Value) -> serde_json::Result<TripRecord> {
    stacker::grow(DECODE_STACK_SIZE, move || serde_json::from_value(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested_routes(depth: usize) -> String {
        let mut text = String::from(r#"{"id":"leaf","from":"a","to":"b"}"#);
        for level in 0..depth {
            text = format!(
                r#"{{"id":"r-{level}","from":"a","to":"b","subRoutes":[{text}]}}"#
            );
        }
        text
    }

    #[test]
    fn nesting_past_the_default_limit_parses() {
        let raw = format!("{}{}", "[".repeat(1_000), "]".repeat(1_000));
        let document = parse_document(raw.as_bytes()).unwrap();
        assert!(document.is_array());
    }

    #[test]
    fn deep_route_chain_decodes() {
        let routes = nested_routes(200);
        let raw = format!(
            r#"{{"id":"trip-deep","schemaVersion":5,"travelData":{{"routes":[{routes}]}}}}"#
        );
        let document = parse_document(raw.as_bytes()).unwrap();
        assert_eq!(document["id"], json!("trip-deep"));

        let record = decode_record(document).unwrap();
        let mut depth = 0;
        let mut route = &record.routes()[0];
        while let Some(next) = route.sub_routes.first() {
            route = next;
            depth += 1;
        }
        assert_eq!(depth, 200);
        assert_eq!(route.id, "leaf");
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_document(br#"{"id":"x","schemaVersion":5}  "#).is_ok());
        assert!(parse_document(br#"{"id":"x","schemaVersion":5}garbage"#).is_err());
    }
}
