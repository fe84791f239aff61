//! XML-RPC wire codec.
//!
//! Encodes a `<methodCall>` document from structured values and decodes a
//! `<methodResponse>` back into them, covering the scalar and compound types
//! the endpoint emits. Decoded integers and doubles land as JSON numbers,
//! `dateTime.iso8601` stays a string in its original form, `base64` payloads
//! decode to text when they are valid UTF-8 and stay base64-encoded when not,
//! and `<nil/>` becomes null.

use std::str;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

/// Decode failures carry a plain description; the transport layer wraps them
/// into its typed error.
type DecodeResult<T> = std::result::Result<T, String>;

/// Decoded payload of a method response: a result value or a declared fault.
#[derive(Debug)]
pub(crate) enum WireResponse {
    /// The `<params>` section, reduced to its single value. Void responses
    /// decode as null.
    Value(Value),
    /// The `<fault>` section, reduced to code and description.
    Fault {
        code: String,
        message: String,
    },
}

/// Serialize one method call with its parameter sequence.
pub(crate) fn encode_call(method: &str, params: &[Value]) -> String {
    let mut xml = String::with_capacity(256 + 128 * params.len());
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("<methodCall><methodName>");
    xml.push_str(&escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        write_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(flag) => {
            out.push_str("<boolean>");
            out.push(if *flag { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        Value::Number(number) if number.is_f64() => {
            out.push_str("<double>");
            out.push_str(&number.to_string());
            out.push_str("</double>");
        }
        Value::Number(number) => {
            out.push_str("<int>");
            out.push_str(&number.to_string());
            out.push_str("</int>");
        }
        Value::String(text) => {
            out.push_str("<string>");
            out.push_str(&escape(text));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Parse a method response document into its result value or fault.
pub(crate) fn decode_response(xml: &str) -> DecodeResult<WireResponse> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    expect_start(&mut reader, b"methodResponse")?;

    match significant_event(&mut reader)? {
        Event::Start(e) if e.name().as_ref() == b"params" => {
            let value = match significant_event(&mut reader)? {
                Event::Start(p) if p.name().as_ref() == b"param" => {
                    let value = parse_value(&mut reader)?;
                    expect_end(&mut reader, b"param")?;
                    expect_end(&mut reader, b"params")?;
                    value
                }
                // A void response carries an empty params section.
                Event::End(e) if e.name().as_ref() == b"params" => Value::Null,
                other => return Err(unexpected("<param>", &other)),
            };
            expect_end(&mut reader, b"methodResponse")?;
            Ok(WireResponse::Value(value))
        }
        Event::Empty(e) if e.name().as_ref() == b"params" => {
            expect_end(&mut reader, b"methodResponse")?;
            Ok(WireResponse::Value(Value::Null))
        }
        Event::Start(e) if e.name().as_ref() == b"fault" => {
            let value = parse_value(&mut reader)?;
            expect_end(&mut reader, b"fault")?;
            expect_end(&mut reader, b"methodResponse")?;
            Ok(fault_from_value(value))
        }
        other => Err(unexpected("<params> or <fault>", &other)),
    }
}

/// Next event that carries content, skipping the declaration, comments,
/// processing instructions and inter-element whitespace.
fn significant_event<'a>(reader: &mut Reader<&'a [u8]>) -> DecodeResult<Event<'a>> {
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
            Event::Text(text) => {
                let content = text.unescape().map_err(|e| e.to_string())?;
                if content.trim().is_empty() {
                    continue;
                }
                return Ok(Event::Text(text));
            }
            event => return Ok(event),
        }
    }
}

fn expect_start(reader: &mut Reader<&[u8]>, name: &[u8]) -> DecodeResult<()> {
    match significant_event(reader)? {
        Event::Start(e) if e.name().as_ref() == name => Ok(()),
        other => Err(unexpected(&format!("<{}>", String::from_utf8_lossy(name)), &other)),
    }
}

fn expect_end(reader: &mut Reader<&[u8]>, name: &[u8]) -> DecodeResult<()> {
    match significant_event(reader)? {
        Event::End(e) if e.name().as_ref() == name => Ok(()),
        other => Err(unexpected(&format!("</{}>", String::from_utf8_lossy(name)), &other)),
    }
}

fn unexpected(expected: &str, found: &Event<'_>) -> String {
    match found {
        Event::Eof => format!("expected {expected}, found end of document"),
        other => format!("expected {expected}, found {other:?}"),
    }
}

/// Parse one `<value>...</value>` element.
fn parse_value(reader: &mut Reader<&[u8]>) -> DecodeResult<Value> {
    match significant_event(reader)? {
        Event::Start(e) if e.name().as_ref() == b"value" => parse_value_body(reader),
        Event::Empty(e) if e.name().as_ref() == b"value" => Ok(Value::String(String::new())),
        other => Err(unexpected("<value>", &other)),
    }
}

/// Parse the content of a value element, after its start tag has been
/// consumed. Untyped text content is a string per the XML-RPC convention.
fn parse_value_body(reader: &mut Reader<&[u8]>) -> DecodeResult<Value> {
    let value = match significant_event(reader)? {
        Event::Text(text) => {
            let content = text.unescape().map_err(|e| e.to_string())?.into_owned();
            expect_end(reader, b"value")?;
            return Ok(Value::String(content));
        }
        Event::End(e) if e.name().as_ref() == b"value" => {
            return Ok(Value::String(String::new()));
        }
        Event::Empty(e) => {
            let tag = e.name().as_ref().to_vec();
            empty_value(&tag)?
        }
        Event::Start(e) => {
            let tag = e.name().as_ref().to_vec();
            parse_typed(reader, &tag)?
        }
        other => return Err(unexpected("value content", &other)),
    };
    expect_end(reader, b"value")?;
    Ok(value)
}

/// Parse a typed value whose opening tag has been consumed.
fn parse_typed(reader: &mut Reader<&[u8]>, tag: &[u8]) -> DecodeResult<Value> {
    match tag {
        b"struct" => parse_struct(reader),
        b"array" => parse_array(reader),
        b"nil" => {
            expect_end(reader, b"nil")?;
            Ok(Value::Null)
        }
        _ => {
            let text = scalar_text(reader, tag)?;
            scalar_value(tag, &text)
        }
    }
}

/// Value of a self-closing element such as `<nil/>` or `<string/>`.
fn empty_value(tag: &[u8]) -> DecodeResult<Value> {
    match tag {
        b"nil" => Ok(Value::Null),
        b"string" | b"dateTime.iso8601" | b"base64" => Ok(Value::String(String::new())),
        b"struct" => Ok(Value::Object(Map::new())),
        b"array" => Ok(Value::Array(Vec::new())),
        other => Err(format!("empty <{}/> value", String::from_utf8_lossy(other))),
    }
}

fn parse_struct(reader: &mut Reader<&[u8]>) -> DecodeResult<Value> {
    let mut members = Map::new();
    loop {
        match significant_event(reader)? {
            Event::Start(e) if e.name().as_ref() == b"member" => {
                expect_start(reader, b"name")?;
                let name = scalar_text(reader, b"name")?;
                let value = parse_value(reader)?;
                expect_end(reader, b"member")?;
                members.insert(name, value);
            }
            Event::End(e) if e.name().as_ref() == b"struct" => {
                return Ok(Value::Object(members));
            }
            other => return Err(unexpected("<member> or </struct>", &other)),
        }
    }
}

fn parse_array(reader: &mut Reader<&[u8]>) -> DecodeResult<Value> {
    let mut items = Vec::new();
    match significant_event(reader)? {
        Event::Start(e) if e.name().as_ref() == b"data" => {}
        Event::Empty(e) if e.name().as_ref() == b"data" => {
            expect_end(reader, b"array")?;
            return Ok(Value::Array(items));
        }
        other => return Err(unexpected("<data>", &other)),
    }
    loop {
        match significant_event(reader)? {
            Event::Start(e) if e.name().as_ref() == b"value" => {
                items.push(parse_value_body(reader)?);
            }
            Event::Empty(e) if e.name().as_ref() == b"value" => {
                items.push(Value::String(String::new()));
            }
            Event::End(e) if e.name().as_ref() == b"data" => break,
            other => return Err(unexpected("<value> or </data>", &other)),
        }
    }
    expect_end(reader, b"array")?;
    Ok(Value::Array(items))
}

/// Raw text content of a scalar element, up to its closing tag. Whitespace
/// inside the element is preserved.
fn scalar_text(reader: &mut Reader<&[u8]>, tag: &[u8]) -> DecodeResult<String> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Text(t) => {
                text.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                let content =
                    str::from_utf8(&bytes).map_err(|e| format!("CDATA is not UTF-8: {e}"))?;
                text.push_str(content);
            }
            Event::End(e) if e.name().as_ref() == tag => return Ok(text),
            Event::Eof => return Err("unexpected end of document in scalar value".to_owned()),
            other => return Err(unexpected("scalar text", &other)),
        }
    }
}

fn scalar_value(tag: &[u8], text: &str) -> DecodeResult<Value> {
    match tag {
        b"string" => Ok(Value::String(text.to_owned())),
        b"int" | b"i4" | b"i8" => {
            let number = text
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("invalid integer {text:?}: {e}"))?;
            Ok(Value::Number(number.into()))
        }
        b"double" => {
            let number = text
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid double {text:?}: {e}"))?;
            Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| format!("double {text:?} is not representable"))
        }
        b"boolean" => match text.trim() {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(format!("invalid boolean {other:?}")),
        },
        // Kept verbatim; the endpoint's timestamp format is not ISO 8601
        // proper and callers parse it with their own tooling.
        b"dateTime.iso8601" => Ok(Value::String(text.trim().to_owned())),
        b"base64" => {
            let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = BASE64
                .decode(cleaned.as_bytes())
                .map_err(|e| format!("invalid base64 payload: {e}"))?;
            // Raw bytes have no structured representation; payloads that are
            // not UTF-8 text stay in their base64 form for the caller to
            // decode.
            match String::from_utf8(bytes) {
                Ok(content) => Ok(Value::String(content)),
                Err(_) => Ok(Value::String(cleaned)),
            }
        }
        other => Err(format!(
            "unsupported value type <{}>",
            String::from_utf8_lossy(other)
        )),
    }
}

/// Shape a decoded fault structure. The endpoint declares string fault codes;
/// integer codes from standard XML-RPC implementations are stringified.
fn fault_from_value(value: Value) -> WireResponse {
    let (code, message) = match value {
        Value::Object(mut members) => {
            let code = match members.remove("faultCode") {
                Some(Value::String(text)) => text,
                Some(Value::Number(number)) => number.to_string(),
                _ => String::new(),
            };
            let message = match members.remove("faultString") {
                Some(Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            (code, message)
        }
        other => (String::new(), other.to_string()),
    };
    WireResponse::Fault { code, message }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response_with_value(value_xml: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><methodResponse><params><param><value>{value_xml}</value></param></params></methodResponse>"
        )
    }

    fn decode_value(value_xml: &str) -> Value {
        match decode_response(&response_with_value(value_xml)).unwrap() {
            WireResponse::Value(value) => value,
            WireResponse::Fault { code, message } => {
                panic!("unexpected fault {code}: {message}")
            }
        }
    }

    #[test]
    fn encodes_scalars_structs_and_arrays() {
        let params = [json!({
            "headers": {
                "authenticate": { "username": "u", "apiKey": "k" },
            },
        })];
        let xml = encode_call("getObject", &params);

        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <methodCall><methodName>getObject</methodName><params>\
             <param><value><struct>\
             <member><name>headers</name><value><struct>\
             <member><name>authenticate</name><value><struct>\
             <member><name>apiKey</name><value><string>k</string></value></member>\
             <member><name>username</name><value><string>u</string></value></member>\
             </struct></value></member>\
             </struct></value></member>\
             </struct></value></param>\
             </params></methodCall>"
        );
    }

    #[test]
    fn encodes_each_scalar_kind() {
        let params = [json!([1, -2, 3.5, true, false, null, "text"])];
        let xml = encode_call("setTags", &params);

        assert!(xml.contains("<value><int>1</int></value>"));
        assert!(xml.contains("<value><int>-2</int></value>"));
        assert!(xml.contains("<value><double>3.5</double></value>"));
        assert!(xml.contains("<value><boolean>1</boolean></value>"));
        assert!(xml.contains("<value><boolean>0</boolean></value>"));
        assert!(xml.contains("<value><nil/></value>"));
        assert!(xml.contains("<value><string>text</string></value>"));
    }

    #[test]
    fn escapes_markup_in_strings() {
        let params = [json!("a <tag> & more")];
        let xml = encode_call("setNotes", &params);
        assert!(xml.contains("<string>a &lt;tag&gt; &amp; more</string>"));
    }

    #[test]
    fn decodes_scalar_string() {
        assert_eq!(decode_value("<string>hello</string>"), json!("hello"));
    }

    #[test]
    fn decodes_bare_text_as_string() {
        assert_eq!(decode_value("bare text"), json!("bare text"));
    }

    #[test]
    fn decodes_integer_spellings() {
        assert_eq!(decode_value("<int>42</int>"), json!(42));
        assert_eq!(decode_value("<i4>-7</i4>"), json!(-7));
        assert_eq!(decode_value("<i8>8589934592</i8>"), json!(8_589_934_592_i64));
    }

    #[test]
    fn decodes_double_boolean_and_nil() {
        assert_eq!(decode_value("<double>3.25</double>"), json!(3.25));
        assert_eq!(decode_value("<boolean>1</boolean>"), json!(true));
        assert_eq!(decode_value("<boolean>0</boolean>"), json!(false));
        assert_eq!(decode_value("<nil/>"), Value::Null);
    }

    #[test]
    fn keeps_datetime_text_verbatim() {
        assert_eq!(
            decode_value("<dateTime.iso8601>20240115T10:30:00-06:00</dateTime.iso8601>"),
            json!("20240115T10:30:00-06:00")
        );
    }

    #[test]
    fn decodes_base64_payload_to_text() {
        assert_eq!(decode_value("<base64>aGVsbG8=</base64>"), json!("hello"));
    }

    #[test]
    fn binary_base64_payload_stays_encoded() {
        // 0xFF 0xFE is not valid UTF-8, so the payload survives as base64.
        assert_eq!(decode_value("<base64>//4=</base64>"), json!("//4="));
    }

    #[test]
    fn binary_base64_payload_with_whitespace_stays_encoded() {
        assert_eq!(decode_value("<base64>//4\n=</base64>"), json!("//4="));
    }

    #[test]
    fn unescapes_entities_in_strings() {
        assert_eq!(
            decode_value("<string>a &lt;tag&gt; &amp; more</string>"),
            json!("a <tag> & more")
        );
    }

    #[test]
    fn decodes_struct_with_mixed_members() {
        let value = decode_value(
            "<struct>\
             <member><name>id</name><value><int>1204</int></value></member>\
             <member><name>hostname</name><value><string>web01</string></value></member>\
             <member><name>active</name><value><boolean>1</boolean></value></member>\
             <member><name>notes</name><value><nil/></value></member>\
             </struct>",
        );
        assert_eq!(
            value,
            json!({
                "id": 1204,
                "hostname": "web01",
                "active": true,
                "notes": null,
            })
        );
    }

    #[test]
    fn decodes_array_of_structs() {
        let value = decode_value(
            "<array><data>\
             <value><struct><member><name>id</name><value><int>1</int></value></member></struct></value>\
             <value><struct><member><name>id</name><value><int>2</int></value></member></struct></value>\
             </data></array>",
        );
        assert_eq!(value, json!([{ "id": 1 }, { "id": 2 }]));
    }

    #[test]
    fn decodes_empty_array_and_struct() {
        assert_eq!(decode_value("<array><data></data></array>"), json!([]));
        assert_eq!(decode_value("<struct></struct>"), json!({}));
    }

    #[test]
    fn tolerates_pretty_printed_documents() {
        let xml = "<?xml version=\"1.0\"?>\n<methodResponse>\n  <params>\n    <param>\n      <value>\n        <struct>\n          <member>\n            <name>id</name>\n            <value><int>99</int></value>\n          </member>\n        </struct>\n      </value>\n    </param>\n  </params>\n</methodResponse>\n";
        match decode_response(xml).unwrap() {
            WireResponse::Value(value) => assert_eq!(value, json!({ "id": 99 })),
            WireResponse::Fault { code, message } => {
                panic!("unexpected fault {code}: {message}")
            }
        }
    }

    #[test]
    fn void_response_is_null() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><params></params></methodResponse>";
        match decode_response(xml).unwrap() {
            WireResponse::Value(value) => assert_eq!(value, Value::Null),
            WireResponse::Fault { code, message } => {
                panic!("unexpected fault {code}: {message}")
            }
        }
    }

    #[test]
    fn fault_with_string_code() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><string>SoftLayer_Exception_ObjectNotFound</string></value></member>\
                   <member><name>faultString</name><value><string>Unable to find object</string></value></member>\
                   </struct></value></fault></methodResponse>";
        match decode_response(xml).unwrap() {
            WireResponse::Fault { code, message } => {
                assert_eq!(code, "SoftLayer_Exception_ObjectNotFound");
                assert_eq!(message, "Unable to find object");
            }
            WireResponse::Value(value) => panic!("unexpected value {value}"),
        }
    }

    #[test]
    fn integer_fault_code_is_stringified() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><int>-32601</int></value></member>\
                   <member><name>faultString</name><value><string>Method not found</string></value></member>\
                   </struct></value></fault></methodResponse>";
        match decode_response(xml).unwrap() {
            WireResponse::Fault { code, message } => {
                assert_eq!(code, "-32601");
                assert_eq!(message, "Method not found");
            }
            WireResponse::Value(value) => panic!("unexpected value {value}"),
        }
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(decode_response("<methodResponse><params><param>").is_err());
    }

    #[test]
    fn non_xmlrpc_document_is_an_error() {
        assert!(decode_response("<html><body>Bad Gateway</body></html>").is_err());
        assert!(decode_response("not xml at all").is_err());
    }

    #[test]
    fn invalid_scalar_content_is_an_error() {
        let xml = response_with_value("<int>not-a-number</int>");
        assert!(decode_response(&xml).is_err());
    }

    #[test]
    fn call_roundtrips_through_decoder_shapes() {
        // The encoder's struct layout must be what the decoder understands;
        // a response reusing the request body shape decodes to the same
        // value.
        let original = json!({
            "id": 1204,
            "tags": ["web", "production"],
            "ratio": 0.5,
            "parent": null,
        });
        let xml = encode_call("echo", std::slice::from_ref(&original));
        let value_xml = xml
            .split("<param><value>")
            .nth(1)
            .and_then(|rest| rest.split("</value></param>").next())
            .unwrap();
        assert_eq!(decode_value(value_xml), original);
    }
}
