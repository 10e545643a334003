//! Smartbridge pack/unpack entry points

use std::collections::BTreeMap;

use serde_json::Value;

use slp_configs::NetworkConfig;
use slp_math::Decimal;

use crate::formats::{FieldValue, FixedFormat, FormatAtom};
use crate::ops::{Family, Payload, Slp1Op, Slp2Op};
use crate::varia::{pack_meta, pack_varia, unpack_meta, unpack_varia};
use crate::CodecError;

/// Hard cap on a vendor-field string.
pub const MAX_LEN: usize = 256;

const PREFIX_LEN: usize = "_slpN://".len();

/// Decodes a vendor-field string into a typed payload.
///
/// Fails when the regex gate misses, the family is not active at `height`,
/// the opcode is unknown to the milestone, or the byte layout is off.
pub fn unpack(
    config: &NetworkConfig,
    height: Option<u64>,
    smartbridge: &str,
) -> Result<Payload, CodecError> {
    if smartbridge.len() > MAX_LEN {
        return Err(CodecError::OverLength);
    }
    let gate = config.serialized_regex()?;
    let captures = gate
        .captures(smartbridge)
        .ok_or(CodecError::InvalidSmartbridge)?;
    let (slp_type, data) = match (captures.get(1), captures.get(2)) {
        (Some(t), Some(d)) => (t.as_str(), d.as_str().as_bytes()),
        _ => return Err(CodecError::InvalidSmartbridge),
    };
    if !config.slp_types(height)?.iter().any(|t| t == slp_type) {
        return Err(CodecError::UnknownSlpType(slp_type.to_string()));
    }
    let family: Family = slp_type.parse()?;

    let code = hex_byte(data)?;
    let tp = config
        .input_types(height)?
        .into_iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| name)
        .ok_or(CodecError::UnknownOperation(code))?;

    match family {
        Family::Slp1 => unpack_slp1(config, height, &tp, data),
        Family::Slp2 => unpack_slp2(config, height, &tp, data),
    }
}

/// Encodes a payload into one or more vendor-field strings. Every operation
/// yields a single bridge except ADDMETA, whose metadata may be chunked.
pub fn pack(
    config: &NetworkConfig,
    height: Option<u64>,
    payload: &Payload,
) -> Result<Vec<String>, CodecError> {
    let family = payload.family();
    let code = opcode(config, height, payload.op_name())?;
    let formats = config.slp_formats(family.as_str(), height)?;

    let bodies = match payload {
        Payload::Slp1(op) => pack_slp1(&formats, code, op)?,
        Payload::Slp2(op) => pack_slp2(&formats, code, op)?,
    };
    let mut bridges = Vec::with_capacity(bodies.len());
    for body in bodies {
        let bridge = format!("{}://{}", family.as_str(), body);
        if bridge.len() > MAX_LEN {
            return Err(CodecError::OverLength);
        }
        bridges.push(bridge);
    }
    Ok(bridges)
}

fn unpack_slp1(
    config: &NetworkConfig,
    height: Option<u64>,
    tp: &str,
    data: &[u8],
) -> Result<Payload, CodecError> {
    let formats = config.slp_formats(Family::Slp1.as_str(), height)?;
    let op = match tp {
        "GENESIS" => {
            let (values, varia) = split_fixed(&formats, 0, data, 0)?;
            let strings = unpack_varia(varia, 4)?;
            let [sy, na, du, no] = four(strings);
            Slp1Op::Genesis {
                id: String::new(),
                de: u8::try_from(values[1].as_uint()?)
                    .map_err(|_| CodecError::InvalidField("de"))?,
                qt: quantity(&values[2])?,
                sy,
                na,
                du,
                no,
                pa: values[3].as_bool()?,
                mi: values[4].as_bool()?,
            }
        }
        "BURN" | "MINT" | "SEND" => {
            let (values, varia) = split_fixed(&formats, 1, data, 0)?;
            let id = hex::encode(values[1].as_bytes()?);
            let qt = quantity(&values[2])?;
            let no = unpack_varia(varia, 1)?.remove(0);
            match tp {
                "BURN" => Slp1Op::Burn { id, qt, no },
                "MINT" => Slp1Op::Mint { id, qt, no },
                _ => Slp1Op::Send { id, qt, no },
            }
        }
        "PAUSE" | "RESUME" | "NEWOWNER" | "FREEZE" | "UNFREEZE" => {
            let (values, varia) = split_fixed(&formats, 2, data, 0)?;
            let id = hex::encode(values[1].as_bytes()?);
            let no = unpack_varia(varia, 1)?.remove(0);
            match tp {
                "PAUSE" => Slp1Op::Pause { id, no },
                "RESUME" => Slp1Op::Resume { id, no },
                "NEWOWNER" => Slp1Op::NewOwner { id, no },
                "FREEZE" => Slp1Op::Freeze { id, no },
                _ => Slp1Op::Unfreeze { id, no },
            }
        }
        _ => return Err(CodecError::InvalidField("tp")),
    };
    Ok(Payload::Slp1(op))
}

fn unpack_slp2(
    config: &NetworkConfig,
    height: Option<u64>,
    tp: &str,
    data: &[u8],
) -> Result<Payload, CodecError> {
    let formats = config.slp_formats(Family::Slp2.as_str(), height)?;
    let op = match tp {
        "GENESIS" => {
            let (values, varia) = split_fixed(&formats, 0, data, 0)?;
            let strings = unpack_varia(varia, 4)?;
            let [sy, na, du, no] = four(strings);
            Slp2Op::Genesis {
                id: String::new(),
                sy,
                na,
                du,
                no,
                pa: values[1].as_bool()?,
            }
        }
        "ADDMETA" => {
            // generic format plus one trailing chunk byte
            let (values, rest) = split_fixed(&formats, 1, data, 1)?;
            let id = hex::encode(values[1].as_bytes()?);
            let ch = hex_byte_at(data, fixed_hex_len(&formats, 1)?)?;
            let bag = unpack_meta(rest)?;
            Slp2Op::AddMeta {
                id,
                ch,
                na: None,
                dt: canonical_meta(&bag),
            }
        }
        "VOIDMETA" => {
            let (values, _) = split_fixed(&formats, 2, data, 0)?;
            Slp2Op::VoidMeta {
                id: hex::encode(values[1].as_bytes()?),
                tx: hex::encode(values[2].as_bytes()?),
            }
        }
        "PAUSE" | "RESUME" | "NEWOWNER" | "AUTHMETA" | "REVOKEMETA" | "CLONE" => {
            let (values, varia) = split_fixed(&formats, 1, data, 0)?;
            let id = hex::encode(values[1].as_bytes()?);
            let no = unpack_varia(varia, 1)?.remove(0);
            match tp {
                "PAUSE" => Slp2Op::Pause { id, no },
                "RESUME" => Slp2Op::Resume { id, no },
                "NEWOWNER" => Slp2Op::NewOwner { id, no },
                "AUTHMETA" => Slp2Op::AuthMeta { id, no },
                "REVOKEMETA" => Slp2Op::RevokeMeta { id, no },
                _ => Slp2Op::Clone { id, no },
            }
        }
        _ => return Err(CodecError::InvalidField("tp")),
    };
    Ok(Payload::Slp2(op))
}

fn pack_slp1(
    formats: &[Vec<String>],
    code: u8,
    op: &Slp1Op,
) -> Result<Vec<String>, CodecError> {
    match op {
        Slp1Op::Genesis { de, qt, sy, na, du, no, pa, mi, .. } => {
            let format = format_at(formats, 0)?;
            let fixed = format.pack(&[
                FieldValue::Uint(code.into()),
                FieldValue::Uint((*de).into()),
                quantity_value(&format, 2, qt)?,
                FieldValue::Bool(*pa),
                FieldValue::Bool(*mi),
            ])?;
            Ok(vec![join(&fixed, &pack_varia(&[sy, na, du, no])?)?])
        }
        Slp1Op::Burn { id, qt, no }
        | Slp1Op::Mint { id, qt, no }
        | Slp1Op::Send { id, qt, no } => {
            let format = format_at(formats, 1)?;
            let fixed = format.pack(&[
                FieldValue::Uint(code.into()),
                FieldValue::Bytes(token_bytes(id)?),
                quantity_value(&format, 2, qt)?,
            ])?;
            Ok(vec![join(&fixed, &pack_varia(&[no])?)?])
        }
        Slp1Op::Pause { id, no }
        | Slp1Op::Resume { id, no }
        | Slp1Op::NewOwner { id, no }
        | Slp1Op::Freeze { id, no }
        | Slp1Op::Unfreeze { id, no } => {
            let format = format_at(formats, 2)?;
            let fixed = format.pack(&[
                FieldValue::Uint(code.into()),
                FieldValue::Bytes(token_bytes(id)?),
            ])?;
            Ok(vec![join(&fixed, &pack_varia(&[no])?)?])
        }
    }
}

fn pack_slp2(
    formats: &[Vec<String>],
    code: u8,
    op: &Slp2Op,
) -> Result<Vec<String>, CodecError> {
    match op {
        Slp2Op::Genesis { sy, na, du, no, pa, .. } => {
            let format = format_at(formats, 0)?;
            let fixed = format.pack(&[FieldValue::Uint(code.into()), FieldValue::Bool(*pa)])?;
            Ok(vec![join(&fixed, &pack_varia(&[sy, na, du, no])?)?])
        }
        Slp2Op::AddMeta { id, na, dt, .. } => {
            let format = format_at(formats, 1)?;
            let fixed = format.pack(&[
                FieldValue::Uint(code.into()),
                FieldValue::Bytes(token_bytes(id)?),
            ])?;
            let bag = match na {
                Some(key) => BTreeMap::from([(key.clone(), dt.clone())]),
                None => meta_from_json(dt)?,
            };
            chunk_meta(&fixed, &bag)
        }
        Slp2Op::VoidMeta { id, tx } => {
            let format = format_at(formats, 2)?;
            let fixed = format.pack(&[
                FieldValue::Uint(code.into()),
                FieldValue::Bytes(token_bytes(id)?),
                FieldValue::Bytes(hex::decode(tx).map_err(|_| CodecError::InvalidField("tx"))?),
            ])?;
            Ok(vec![hex::encode(fixed)])
        }
        Slp2Op::Pause { id, no }
        | Slp2Op::Resume { id, no }
        | Slp2Op::NewOwner { id, no }
        | Slp2Op::AuthMeta { id, no }
        | Slp2Op::RevokeMeta { id, no }
        | Slp2Op::Clone { id, no } => {
            let format = format_at(formats, 1)?;
            let fixed = format.pack(&[
                FieldValue::Uint(code.into()),
                FieldValue::Bytes(token_bytes(id)?),
            ])?;
            Ok(vec![join(&fixed, &pack_varia(&[no])?)?])
        }
    }
}

/// Splits metadata over as many bridges as its size demands. Budget per
/// bridge: the 256-byte cap minus the prefix and the hex-doubled fixed
/// header and chunk byte.
fn chunk_meta(fixed: &[u8], bag: &BTreeMap<String, String>) -> Result<Vec<String>, CodecError> {
    let budget = MAX_LEN - PREFIX_LEN - 2 * (fixed.len() + 1);
    let mut pairs: Vec<(&String, &String)> = bag.iter().collect();
    pairs.sort_by_key(|(k, v)| k.len() + v.len());

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut serial: Vec<u8> = Vec::new();
    let mut remaining = budget;
    for (key, value) in pairs {
        let packed = pack_varia(&[key.as_str(), value.as_str()])?;
        if key.len() + value.len() < remaining.saturating_sub(2) {
            serial.extend_from_slice(&packed);
            remaining -= packed.len();
        } else {
            chunks.push(std::mem::take(&mut serial));
            serial = packed;
            remaining = budget;
        }
    }
    chunks.push(serial);

    chunks
        .iter()
        .enumerate()
        .map(|(i, serial)| {
            let chunk = u8::try_from(i + 1).map_err(|_| CodecError::OverLength)?;
            let mut header = fixed.to_vec();
            header.push(chunk);
            join(&header, serial)
        })
        .collect()
}

fn meta_from_json(dt: &str) -> Result<BTreeMap<String, String>, CodecError> {
    let value: Value = serde_json::from_str(dt).map_err(|_| CodecError::InvalidField("dt"))?;
    let object = value.as_object().ok_or(CodecError::InvalidField("dt"))?;
    object
        .iter()
        .map(|(k, v)| match v.as_str() {
            Some(s) => Ok((k.clone(), s.to_string())),
            None => Err(CodecError::InvalidField("dt")),
        })
        .collect()
}

/// Canonical JSON rendering of a metadata bag, the `dt` form stored on
/// ADDMETA records.
pub fn canonical_meta(bag: &BTreeMap<String, String>) -> String {
    serde_json::to_string(bag).unwrap_or_default()
}

fn format_at(formats: &[Vec<String>], index: usize) -> Result<FixedFormat, CodecError> {
    let names = formats.get(index).ok_or(CodecError::InvalidSmartbridge)?;
    FixedFormat::from_names(names)
}

fn fixed_hex_len(formats: &[Vec<String>], index: usize) -> Result<usize, CodecError> {
    Ok(format_at(formats, index)?.size() * 2)
}

/// Decodes the hex fixed header (plus `extra` trailing bytes) and returns
/// the atom values together with the raw varia tail.
fn split_fixed<'a>(
    formats: &[Vec<String>],
    index: usize,
    data: &'a [u8],
    extra: usize,
) -> Result<(Vec<FieldValue>, &'a [u8]), CodecError> {
    let format = format_at(formats, index)?;
    let hex_len = (format.size() + extra) * 2;
    if data.len() < hex_len {
        return Err(CodecError::InvalidSmartbridge);
    }
    let raw = hex::decode(&data[..hex_len]).map_err(|_| CodecError::InvalidSmartbridge)?;
    let values = format.unpack(&raw[..format.size()])?;
    Ok((values, &data[hex_len..]))
}

fn hex_byte(data: &[u8]) -> Result<u8, CodecError> {
    hex_byte_at(data, 0)
}

fn hex_byte_at(data: &[u8], offset: usize) -> Result<u8, CodecError> {
    let end = offset + 2;
    if data.len() < end {
        return Err(CodecError::InvalidSmartbridge);
    }
    let raw = hex::decode(&data[offset..end]).map_err(|_| CodecError::InvalidSmartbridge)?;
    Ok(raw[0])
}

fn opcode(
    config: &NetworkConfig,
    height: Option<u64>,
    op_name: &'static str,
) -> Result<u8, CodecError> {
    config
        .input_types(height)?
        .get(op_name)
        .copied()
        .ok_or(CodecError::UnsupportedOperation(op_name))
}

fn quantity(value: &FieldValue) -> Result<Decimal, CodecError> {
    match value {
        FieldValue::Uint(v) => Ok(Decimal::from(*v)),
        FieldValue::Float(v) => Ok(Decimal::try_from(*v)?),
        _ => Err(CodecError::InvalidField("qt")),
    }
}

/// Renders a quantity for whichever atom the milestone puts at `index`.
fn quantity_value(
    format: &FixedFormat,
    index: usize,
    qt: &Decimal,
) -> Result<FieldValue, CodecError> {
    match format.atoms().get(index) {
        Some(FormatAtom::U64) => {
            let integral = qt.rescale(0).map_err(|_| CodecError::InvalidField("qt"))?;
            u64::try_from(integral.mantissa())
                .map(FieldValue::Uint)
                .map_err(|_| CodecError::InvalidField("qt"))
        }
        Some(FormatAtom::F64) => {
            let scaled = qt.mantissa() as f64 / 10f64.powi(qt.scale() as i32);
            Ok(FieldValue::Float(scaled))
        }
        _ => Err(CodecError::InvalidField("qt")),
    }
}

fn token_bytes(id: &str) -> Result<Vec<u8>, CodecError> {
    let raw = hex::decode(id).map_err(|_| CodecError::InvalidField("id"))?;
    if raw.len() != 16 {
        return Err(CodecError::InvalidField("id"));
    }
    Ok(raw)
}

fn join(fixed: &[u8], varia: &[u8]) -> Result<String, CodecError> {
    let mut out = hex::encode(fixed);
    let tail = std::str::from_utf8(varia).map_err(|_| CodecError::VariaTooLong)?;
    out.push_str(tail);
    Ok(out)
}

fn four(mut strings: Vec<String>) -> [String; 4] {
    let no = strings.pop().unwrap_or_default();
    let du = strings.pop().unwrap_or_default();
    let na = strings.pop().unwrap_or_default();
    let sy = strings.pop().unwrap_or_default();
    [sy, na, du, no]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> NetworkConfig {
        NetworkConfig::from_values(
            "testnet",
            json!({
                "serialized regex": "^(_slp[0-9]+)://(.*)$",
            }),
            json!({
                "1": {
                    "slp types": ["_slp1", "_slp2"],
                    "input types": {
                        "GENESIS": 0, "BURN": 1, "MINT": 2, "SEND": 3,
                        "PAUSE": 4, "RESUME": 5, "NEWOWNER": 6,
                        "FREEZE": 7, "UNFREEZE": 8, "AUTHMETA": 9,
                        "ADDMETA": 10, "VOIDMETA": 11, "REVOKEMETA": 12,
                        "CLONE": 13,
                    },
                    "slp formats": {
                        "_slp1": [
                            ["u8", "u8", "u64", "bool", "bool"],
                            ["u8", "bytes16", "f64"],
                            ["u8", "bytes16"],
                        ],
                        "_slp2": [
                            ["u8", "bool"],
                            ["u8", "bytes16"],
                            ["u8", "bytes16", "bytes32"],
                        ],
                    },
                },
            }),
        )
        .unwrap()
    }

    #[test]
    fn slp1_genesis_round_trip() {
        let cfg = config();
        let payload = Payload::Slp1(Slp1Op::Genesis {
            id: String::new(),
            de: 2,
            qt: Decimal::from(1000u64),
            sy: "ABC".into(),
            na: "Token".into(),
            du: String::new(),
            no: String::new(),
            pa: false,
            mi: false,
        });
        let bridges = pack(&cfg, Some(1), &payload).unwrap();
        assert_eq!(bridges.len(), 1);
        assert!(bridges[0].starts_with("_slp1://"));
        let decoded = unpack(&cfg, Some(1), &bridges[0]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn slp1_send_uses_float_milestone_format() {
        let cfg = config();
        let payload = Payload::Slp1(Slp1Op::Send {
            id: "0a".repeat(16),
            qt: "250.5".parse().unwrap(),
            no: String::new(),
        });
        let bridges = pack(&cfg, Some(1), &payload).unwrap();
        let decoded = unpack(&cfg, Some(1), &bridges[0]).unwrap();
        match decoded {
            Payload::Slp1(Slp1Op::Send { id, qt, .. }) => {
                assert_eq!(id, "0a".repeat(16));
                assert_eq!(qt, "250.5".parse().unwrap());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn slp2_voidmeta_round_trip() {
        let cfg = config();
        let payload = Payload::Slp2(Slp2Op::VoidMeta {
            id: "0b".repeat(16),
            tx: "cd".repeat(32),
        });
        let bridges = pack(&cfg, Some(1), &payload).unwrap();
        assert_eq!(unpack(&cfg, Some(1), &bridges[0]).unwrap(), payload);
    }

    #[test]
    fn addmeta_chunks_when_over_budget() {
        let cfg = config();
        let mut entries = serde_json::Map::new();
        for i in 0..10 {
            entries.insert(format!("key-{i:02}"), Value::from("v".repeat(40)));
        }
        let payload = Payload::Slp2(Slp2Op::AddMeta {
            id: "0c".repeat(16),
            ch: 1,
            na: None,
            dt: serde_json::to_string(&entries).unwrap(),
        });
        let bridges = pack(&cfg, Some(1), &payload).unwrap();
        assert!(bridges.len() > 1, "expected chunking, got {bridges:?}");

        let mut merged = BTreeMap::new();
        for (i, bridge) in bridges.iter().enumerate() {
            assert!(bridge.len() <= MAX_LEN);
            match unpack(&cfg, Some(1), bridge).unwrap() {
                Payload::Slp2(Slp2Op::AddMeta { ch, dt, .. }) => {
                    assert_eq!(ch as usize, i + 1);
                    merged.append(&mut serde_json::from_str(&dt).unwrap());
                }
                other => panic!("unexpected payload {other:?}"),
            }
        }
        let merged = Value::Object(merged.into_iter().collect());
        assert_eq!(merged, Value::Object(entries));
    }

    #[test]
    fn regex_gate_refuses_foreign_strings() {
        let cfg = config();
        assert!(matches!(
            unpack(&cfg, Some(1), "hello world"),
            Err(CodecError::InvalidSmartbridge)
        ));
    }

    #[test]
    fn unknown_opcode_is_refused() {
        let cfg = config();
        assert!(matches!(
            unpack(&cfg, Some(1), "_slp1://ff00"),
            Err(CodecError::UnknownOperation(0xff))
        ));
    }
}
