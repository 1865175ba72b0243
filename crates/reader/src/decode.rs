// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ciborium::Value;
use snafu::ensure;

use crate::{
    config::WireType,
    error::{DecodeError, InvalidPayloadSnafu, NotMethodShapedSnafu, TrailingBytesSnafu},
    render::{render, render_inline},
};

/// How record payloads are interpreted. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Render the payload as a value.
    Plain(WireType),
    /// Render the payload as `method[arg1,arg2,...]`.
    ///
    /// The payload must be a single-entry map from the method name to its
    /// argument array. A non-array value is a single argument.
    MethodInvocation(WireType),
}

impl Decoder {
    pub fn decode(&self, payload: &[u8]) -> Result<String, DecodeError> {
        let value = parse_payload(payload)?;
        match *self {
            Self::Plain(wire) => render(&value, wire),
            Self::MethodInvocation(wire) => {
                let (name, args) = method_call(value)?;
                let args = args
                    .iter()
                    .map(|arg| render_inline(arg, wire))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{name}[{}]", args.join(",")))
            }
        }
    }
}

/// Decode exactly one CBOR value from `payload`.
pub fn parse_payload(payload: &[u8]) -> Result<Value, DecodeError> {
    let mut rest = payload;
    let value: Value = ciborium::from_reader(&mut rest).map_err(|err| {
        InvalidPayloadSnafu {
            message: err.to_string(),
        }
        .build()
    })?;
    ensure!(rest.is_empty(), TrailingBytesSnafu {
        trailing: rest.len(),
    });
    Ok(value)
}

fn method_call(value: Value) -> Result<(String, Vec<Value>), DecodeError> {
    let Value::Map(mut entries) = value else {
        return NotMethodShapedSnafu {
            reason: "payload is not a map",
        }
        .fail();
    };
    ensure!(entries.len() == 1, NotMethodShapedSnafu {
        reason: "expected exactly one method entry",
    });

    match entries.pop() {
        Some((Value::Text(name), Value::Array(args))) => Ok((name, args)),
        Some((Value::Text(name), arg)) => Ok((name, vec![arg])),
        _ => NotMethodShapedSnafu {
            reason: "method name is not text",
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn cbor(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        ciborium::into_writer(value, &mut out).unwrap();
        out
    }

    fn call(name: &str, args: Value) -> Vec<u8> {
        cbor(&Value::Map(vec![(Value::Text(name.to_string()), args)]))
    }

    #[test]
    fn test_plain_text_and_json() {
        let payload = cbor(&Value::Map(vec![
            (Value::Text("msg".into()), Value::Text("hello world".into())),
            (Value::Text("n".into()), Value::Integer(3.into())),
        ]));

        let text = Decoder::Plain(WireType::Text).decode(&payload).unwrap();
        assert_eq!(text, "msg: hello world\nn: 3");

        let json = Decoder::Plain(WireType::Json).decode(&payload).unwrap();
        assert_eq!(json, r#"{"msg":"hello world","n":3}"#);
    }

    #[test_case(WireType::Text, "order[BUY,42,[1, 2]]" ; "text")]
    #[test_case(WireType::Json, r#"order["BUY",42,[1,2]]"# ; "json")]
    fn test_method_invocation(wire: WireType, expected: &str) {
        let payload = call(
            "order",
            Value::Array(vec![
                Value::Text("BUY".into()),
                Value::Integer(42.into()),
                Value::Array(vec![Value::Integer(1.into()), Value::Integer(2.into())]),
            ]),
        );
        assert_eq!(
            Decoder::MethodInvocation(wire).decode(&payload).unwrap(),
            expected
        );
    }

    #[test]
    fn test_method_single_argument_and_no_arguments() {
        let decoder = Decoder::MethodInvocation(WireType::Text);
        assert_eq!(
            decoder.decode(&call("ping", Value::Text("now".into()))).unwrap(),
            "ping[now]"
        );
        assert_eq!(
            decoder.decode(&call("heartbeat", Value::Array(vec![]))).unwrap(),
            "heartbeat[]"
        );
    }

    #[test_case(cbor(&Value::Text("plain".into())) ; "scalar")]
    #[test_case(cbor(&Value::Map(vec![])) ; "empty map")]
    #[test_case(cbor(&Value::Map(vec![
        (Value::Text("a".into()), Value::Null),
        (Value::Text("b".into()), Value::Null),
    ])) ; "two entries")]
    #[test_case(cbor(&Value::Map(vec![(Value::Integer(1.into()), Value::Null)])) ; "numeric name")]
    fn test_not_method_shaped(payload: Vec<u8>) {
        let err = Decoder::MethodInvocation(WireType::Text)
            .decode(&payload)
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotMethodShaped { .. }), "{err}");
    }

    #[test]
    fn test_invalid_and_trailing_bytes() {
        let decoder = Decoder::Plain(WireType::Text);

        // Additional info 28 is reserved.
        let err = decoder.decode(&[0x1c]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload { .. }), "{err}");

        let mut payload = cbor(&Value::Bool(true));
        payload.extend_from_slice(&[0x01, 0x02]);
        let err = decoder.decode(&payload).unwrap_err();
        assert!(matches!(err, DecodeError::TrailingBytes { trailing: 2 }), "{err}");
    }

    #[test]
    fn test_empty_payload_is_invalid() {
        assert!(Decoder::Plain(WireType::Json).decode(&[]).is_err());
    }
}
