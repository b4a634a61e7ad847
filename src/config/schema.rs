use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "default": { "$ref": "#/$defs/profile" },
            "profiles": {
                "type": "object",
                "additionalProperties": { "$ref": "#/$defs/profile" }
            },
            "thresholds": { "$ref": "#/$defs/thresholds" },
            "exclude": { "$ref": "#/$defs/exclude" }
        },
        "additionalProperties": false,
        "$defs": {
            "profile": {
                "type": "object",
                "properties": {
                    "organization": { "type": "boolean" },
                    "regions": {
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" }, "minItems": 1 }
                        ]
                    },
                    "max_workers": { "type": "integer", "minimum": 1 },
                    "output": { "type": "string", "enum": ["console", "json", "csv", "all"] },
                    "cross_account_role": { "type": "string" },
                    "org_admin_account_id": { "type": "string", "pattern": "^[0-9]{12}$" },
                    "role_arn": { "type": "string", "pattern": "^arn:aws" },
                    "mfa_serial": { "type": "string" },
                    "duration_seconds": { "type": "integer", "minimum": 900, "maximum": 43200 },
                    "save_to": { "type": "string" },
                    "thresholds": { "$ref": "#/$defs/thresholds" },
                    "exclude": { "$ref": "#/$defs/exclude" }
                },
                "additionalProperties": false
            },
            "thresholds": {
                "type": "object",
                "additionalProperties": { "type": "number", "exclusiveMinimum": 0 }
            },
            "exclude": {
                "type": "object",
                "properties": {
                    "accounts": { "type": "array", "items": { "type": "string" } },
                    "regions": { "type": "array", "items": { "type": "string" } },
                    "services": { "type": "array", "items": { "type": "string" } },
                    "arns": { "type": "array", "items": { "type": "string" } }
                },
                "additionalProperties": false
            }
        }
    })
});
