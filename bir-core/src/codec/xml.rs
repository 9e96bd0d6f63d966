//! CBEFF XML (ISO/IEC 19785-3) reader and writer.

use crate::error::BirError;
use crate::model::*;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const CBEFF_NAMESPACE: &str = "http://standards.iso.org/iso-iec/19785/-3/ed-2/";

// ── Reading ──

/// Minimal element tree; CBEFF documents are small and fully materialized anyway.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_tree(bytes: &[u8]) -> Result<Element, BirError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(open_element(&e)?),
            Event::Empty(e) => {
                let el = open_element(&e)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| BirError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(BirError::Xml(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| BirError::Xml("document has no root element".to_string()))
}

fn open_element(e: &BytesStart<'_>) -> Result<Element, BirError> {
    let mut el = Element {
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        ..Default::default()
    };
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attrs.push((key, value));
    }
    Ok(el)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<(), BirError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => return Err(BirError::Xml("more than one root element".to_string())),
    }
    Ok(())
}

/// Decode a CBEFF XML document into a record tree. No invariant checks are run.
pub fn read_record(bytes: &[u8]) -> Result<BiometricRecord, BirError> {
    let root = parse_tree(bytes)?;
    if root.name != "BIR" {
        return Err(BirError::Xml(format!(
            "root element is <{}>, expected <BIR>",
            root.name
        )));
    }

    Ok(BiometricRecord {
        version: root.child("Version").map(read_version).transpose()?,
        cbeff_version: root.child("CBEFFVersion").map(read_version).transpose()?,
        bir_info: root.child("BIRInfo").map(read_bir_info).transpose()?,
        segments: root
            .children_named("BIR")
            .map(read_bir)
            .collect::<Result<Vec<_>, _>>()?,
        others: root.child("Others").map(read_others).unwrap_or_default(),
    })
}

fn read_bir(el: &Element) -> Result<Bir, BirError> {
    Ok(Bir {
        version: el.child("Version").map(read_version).transpose()?,
        cbeff_version: el.child("CBEFFVersion").map(read_version).transpose()?,
        bir_info: el.child("BIRInfo").map(read_bir_info).transpose()?,
        bdb_info: el.child("BDBInfo").map(read_bdb_info).transpose()?,
        bdb: el.child_text("BDB").map(decode_binary).transpose()?,
        sb: el.child_text("SB").map(decode_binary).transpose()?,
        sb_info: el.child("SBInfo").map(|s| SbInfo {
            format: s.child("Format").map(read_registry_id),
        }),
        birs: el
            .children_named("BIR")
            .map(read_bir)
            .collect::<Result<Vec<_>, _>>()?,
        others: el.child("Others").map(read_others).unwrap_or_default(),
    })
}

fn read_version(el: &Element) -> Result<VersionType, BirError> {
    Ok(VersionType {
        major: parse_number(el.child_text("Major").unwrap_or("0"), "Major")?,
        minor: parse_number(el.child_text("Minor").unwrap_or("0"), "Minor")?,
    })
}

fn read_bir_info(el: &Element) -> Result<BirInfo, BirError> {
    Ok(BirInfo {
        creator: el.child_text("Creator").map(str::to_string),
        index: el.child_text("Index").map(str::to_string),
        payload: el.child_text("Payload").map(decode_binary).transpose()?,
        integrity: el
            .child_text("Integrity")
            .map(parse_bool)
            .transpose()?
            .unwrap_or(false),
        creation_date: el.child_text("CreationDate").map(parse_date).transpose()?,
        not_valid_before: el.child_text("NotValidBefore").map(parse_date).transpose()?,
        not_valid_after: el.child_text("NotValidAfter").map(parse_date).transpose()?,
    })
}

fn read_bdb_info(el: &Element) -> Result<BdbInfo, BirError> {
    let types = match el.child_text("Type") {
        Some(list) => list
            .split_whitespace()
            .map(|t| {
                BiometricType::from_value(t)
                    .ok_or_else(|| BirError::Xml(format!("unknown biometric type '{}'", t)))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let subtypes = el
        .child_text("Subtype")
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(BdbInfo {
        challenge_response: el
            .child_text("ChallengeResponse")
            .map(decode_binary)
            .transpose()?,
        index: el.child_text("Index").map(str::to_string),
        format: el.child("Format").map(read_registry_id).unwrap_or_default(),
        encryption: el.child_text("Encryption").map(parse_bool).transpose()?,
        creation_date: el.child_text("CreationDate").map(parse_date).transpose()?,
        not_valid_before: el.child_text("NotValidBefore").map(parse_date).transpose()?,
        not_valid_after: el.child_text("NotValidAfter").map(parse_date).transpose()?,
        types,
        subtypes,
        level: el
            .child_text("Level")
            .map(|v| {
                ProcessedLevel::from_value(v)
                    .ok_or_else(|| BirError::Xml(format!("unknown processed level '{}'", v)))
            })
            .transpose()?,
        product: el.child("Product").map(read_registry_id),
        capture_device: el.child("CaptureDevice").map(read_registry_id),
        feature_extraction_algorithm: el.child("FeatureExtractionAlgorithm").map(read_registry_id),
        comparison_algorithm: el.child("ComparisonAlgorithm").map(read_registry_id),
        compression_algorithm: el.child("CompressionAlgorithm").map(read_registry_id),
        purpose: el
            .child_text("Purpose")
            .map(|v| {
                Purpose::from_value(v)
                    .ok_or_else(|| BirError::Xml(format!("unknown purpose '{}'", v)))
            })
            .transpose()?,
        quality: el.child("Quality").map(read_quality).transpose()?,
    })
}

fn read_quality(el: &Element) -> Result<QualityType, BirError> {
    Ok(QualityType {
        algorithm: el.child("Algorithm").map(read_registry_id),
        score: parse_number(el.child_text("Score").unwrap_or("0"), "Score")?,
        calculation_failed: el.child_text("QualityCalculationFailed").map(str::to_string),
    })
}

fn read_registry_id(el: &Element) -> RegistryIdInfo {
    RegistryIdInfo {
        organization: el.child_text("Organization").unwrap_or_default().to_string(),
        type_code: el.child_text("Type").unwrap_or_default().to_string(),
    }
}

fn read_others(el: &Element) -> BTreeMap<String, String> {
    el.children_named("Entry")
        .filter_map(|e| e.attr("key").map(|k| (k.to_string(), e.text.trim().to_string())))
        .collect()
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, BirError> {
    value
        .trim()
        .parse()
        .map_err(|_| BirError::Xml(format!("{} is not a number: '{}'", field, value)))
}

fn parse_bool(value: &str) -> Result<bool, BirError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(BirError::Xml(format!("not a boolean: '{}'", other))),
    }
}

/// `xs:dateTime`; values without an offset are taken as UTC.
fn parse_date(value: &str) -> Result<DateTime<Utc>, BirError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| BirError::Xml(format!("invalid dateTime '{}': {}", value, e)))
}

fn decode_binary(value: &str) -> Result<Vec<u8>, BirError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

// ── Writing ──

/// Encode a record tree as a CBEFF XML document.
pub fn write_record(record: &BiometricRecord) -> Result<Vec<u8>, BirError> {
    let mut xml = String::new();
    writeln!(
        xml,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#
    )?;
    writeln!(xml, r#"<BIR xmlns="{}">"#, CBEFF_NAMESPACE)?;
    write_header(
        &mut xml,
        1,
        record.version.as_ref(),
        record.cbeff_version.as_ref(),
        record.bir_info.as_ref(),
    )?;
    for seg in &record.segments {
        write_bir(&mut xml, 1, seg)?;
    }
    write_others(&mut xml, 1, &record.others)?;
    writeln!(xml, "</BIR>")?;
    Ok(xml.into_bytes())
}

fn write_bir(xml: &mut String, depth: usize, bir: &Bir) -> Result<(), BirError> {
    let pad = indent(depth);
    writeln!(xml, "{}<BIR>", pad)?;
    write_header(
        xml,
        depth + 1,
        bir.version.as_ref(),
        bir.cbeff_version.as_ref(),
        bir.bir_info.as_ref(),
    )?;
    if let Some(info) = &bir.bdb_info {
        write_bdb_info(xml, depth + 1, info)?;
    }
    if let Some(bdb) = &bir.bdb {
        write_text(xml, depth + 1, "BDB", &STANDARD.encode(bdb))?;
    }
    if let Some(sb) = &bir.sb {
        write_text(xml, depth + 1, "SB", &STANDARD.encode(sb))?;
    }
    for child in &bir.birs {
        write_bir(xml, depth + 1, child)?;
    }
    if let Some(sb_info) = &bir.sb_info {
        writeln!(xml, "{}<SBInfo>", indent(depth + 1))?;
        if let Some(format) = &sb_info.format {
            write_registry_id(xml, depth + 2, "Format", format)?;
        }
        writeln!(xml, "{}</SBInfo>", indent(depth + 1))?;
    }
    write_others(xml, depth + 1, &bir.others)?;
    writeln!(xml, "{}</BIR>", pad)?;
    Ok(())
}

fn write_header(
    xml: &mut String,
    depth: usize,
    version: Option<&VersionType>,
    cbeff_version: Option<&VersionType>,
    bir_info: Option<&BirInfo>,
) -> Result<(), BirError> {
    if let Some(v) = version {
        write_version(xml, depth, "Version", v)?;
    }
    if let Some(v) = cbeff_version {
        write_version(xml, depth, "CBEFFVersion", v)?;
    }
    if let Some(info) = bir_info {
        let pad = indent(depth);
        writeln!(xml, "{}<BIRInfo>", pad)?;
        write_opt_text(xml, depth + 1, "Creator", info.creator.as_deref())?;
        write_opt_text(xml, depth + 1, "Index", info.index.as_deref())?;
        if let Some(payload) = &info.payload {
            write_text(xml, depth + 1, "Payload", &STANDARD.encode(payload))?;
        }
        write_text(xml, depth + 1, "Integrity", bool_text(info.integrity))?;
        write_opt_date(xml, depth + 1, "CreationDate", info.creation_date.as_ref())?;
        write_opt_date(xml, depth + 1, "NotValidBefore", info.not_valid_before.as_ref())?;
        write_opt_date(xml, depth + 1, "NotValidAfter", info.not_valid_after.as_ref())?;
        writeln!(xml, "{}</BIRInfo>", pad)?;
    }
    Ok(())
}

fn write_bdb_info(xml: &mut String, depth: usize, info: &BdbInfo) -> Result<(), BirError> {
    let pad = indent(depth);
    let inner = depth + 1;
    writeln!(xml, "{}<BDBInfo>", pad)?;
    if let Some(cr) = &info.challenge_response {
        write_text(xml, inner, "ChallengeResponse", &STANDARD.encode(cr))?;
    }
    write_opt_text(xml, inner, "Index", info.index.as_deref())?;
    write_registry_id(xml, inner, "Format", &info.format)?;
    if let Some(enc) = info.encryption {
        write_text(xml, inner, "Encryption", bool_text(enc))?;
    }
    write_opt_date(xml, inner, "CreationDate", info.creation_date.as_ref())?;
    write_opt_date(xml, inner, "NotValidBefore", info.not_valid_before.as_ref())?;
    write_opt_date(xml, inner, "NotValidAfter", info.not_valid_after.as_ref())?;
    if !info.types.is_empty() {
        let list: Vec<&str> = info.types.iter().map(|t| t.xml_value()).collect();
        write_text(xml, inner, "Type", &list.join(" "))?;
    }
    if !info.subtypes.is_empty() {
        write_text(xml, inner, "Subtype", &info.subtypes.join(" "))?;
    }
    write_opt_text(xml, inner, "Level", info.level.map(|l| l.xml_value()))?;
    for (name, value) in [
        ("Product", &info.product),
        ("CaptureDevice", &info.capture_device),
        ("FeatureExtractionAlgorithm", &info.feature_extraction_algorithm),
        ("ComparisonAlgorithm", &info.comparison_algorithm),
        ("CompressionAlgorithm", &info.compression_algorithm),
    ] {
        if let Some(id) = value {
            write_registry_id(xml, inner, name, id)?;
        }
    }
    write_opt_text(xml, inner, "Purpose", info.purpose.map(|p| p.xml_value()))?;
    if let Some(q) = &info.quality {
        writeln!(xml, "{}<Quality>", indent(inner))?;
        if let Some(alg) = &q.algorithm {
            write_registry_id(xml, inner + 1, "Algorithm", alg)?;
        }
        write_text(xml, inner + 1, "Score", &q.score.to_string())?;
        write_opt_text(
            xml,
            inner + 1,
            "QualityCalculationFailed",
            q.calculation_failed.as_deref(),
        )?;
        writeln!(xml, "{}</Quality>", indent(inner))?;
    }
    writeln!(xml, "{}</BDBInfo>", pad)?;
    Ok(())
}

fn write_version(xml: &mut String, depth: usize, name: &str, v: &VersionType) -> Result<(), BirError> {
    writeln!(
        xml,
        "{}<{}><Major>{}</Major><Minor>{}</Minor></{}>",
        indent(depth),
        name,
        v.major,
        v.minor,
        name
    )?;
    Ok(())
}

fn write_registry_id(
    xml: &mut String,
    depth: usize,
    name: &str,
    id: &RegistryIdInfo,
) -> Result<(), BirError> {
    writeln!(
        xml,
        "{}<{}><Organization>{}</Organization><Type>{}</Type></{}>",
        indent(depth),
        name,
        escape(id.organization.as_str()),
        escape(id.type_code.as_str()),
        name
    )?;
    Ok(())
}

fn write_others(xml: &mut String, depth: usize, others: &BTreeMap<String, String>) -> Result<(), BirError> {
    if others.is_empty() {
        return Ok(());
    }
    writeln!(xml, "{}<Others>", indent(depth))?;
    for (key, value) in others {
        writeln!(
            xml,
            r#"{}<Entry key="{}">{}</Entry>"#,
            indent(depth + 1),
            escape(key.as_str()),
            escape(value.as_str())
        )?;
    }
    writeln!(xml, "{}</Others>", indent(depth))?;
    Ok(())
}

fn write_text(xml: &mut String, depth: usize, name: &str, value: &str) -> Result<(), BirError> {
    writeln!(xml, "{}<{}>{}</{}>", indent(depth), name, escape(value), name)?;
    Ok(())
}

fn write_opt_text(
    xml: &mut String,
    depth: usize,
    name: &str,
    value: Option<&str>,
) -> Result<(), BirError> {
    match value {
        Some(v) => write_text(xml, depth, name, v),
        None => Ok(()),
    }
}

fn write_opt_date(
    xml: &mut String,
    depth: usize,
    name: &str,
    value: Option<&DateTime<Utc>>,
) -> Result<(), BirError> {
    match value {
        Some(d) => write_text(xml, depth, name, &d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => Ok(()),
    }
}

fn bool_text(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
