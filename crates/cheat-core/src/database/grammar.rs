use crate::api::Location;
use crate::fault::FormatError;
use crate::legacy::{legacy_to_current, LegacyCode, LegacyGrammar, LEGACY_CODE_MAX};
use crate::model::CheatAction;
use crate::search::SearchRegion;
use crate::word::InstructionWord;

/// Separator between record fields.
pub const FIELD_SEPARATOR: char = ':';

/// Type tag of a search region record.
pub const REGION_TAG: &str = "RGN";

/// Record layout a line was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Grammar {
    /// Current cheat record.
    Current,
    /// Current search region record.
    CurrentRegion,
    /// Legacy record with CPU, address, data and write mask.
    LegacyB,
    /// Short legacy record.
    LegacyA,
}

/// Decoded cheat record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatRecord {
    /// Driver the record belongs to.
    pub driver: String,
    /// Layout the record was written in.
    pub grammar: Grammar,
    /// The action, named after the record.
    pub action: CheatAction,
    /// Trailing comment field.
    pub comment: Option<String>,
}

/// Decoded search region record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    /// Driver the record belongs to.
    pub driver: String,
    /// The region, without buffers.
    pub region: SearchRegion,
}

/// One database line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A cheat action.
    Cheat(CheatRecord),
    /// A search region.
    Region(RegionRecord),
}

/// True for lines that carry no record.
#[must_use]
pub fn is_ignorable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

fn hex_exact(fields: &[&str], index: usize, digits: usize, expected: &'static str) -> Result<u32, FormatError> {
    let text = fields[index];
    if text.len() != digits {
        return Err(FormatError::FieldWidth {
            field: index,
            expected,
            actual: text.len(),
        });
    }
    parse_radix(text, index, 16)
}

fn number_between(
    fields: &[&str],
    index: usize,
    digits: std::ops::RangeInclusive<usize>,
    expected: &'static str,
    radix: u32,
) -> Result<u32, FormatError> {
    let text = fields[index];
    if !digits.contains(&text.len()) {
        return Err(FormatError::FieldWidth {
            field: index,
            expected,
            actual: text.len(),
        });
    }
    parse_radix(text, index, radix)
}

fn parse_radix(text: &str, field: usize, radix: u32) -> Result<u32, FormatError> {
    u32::from_str_radix(text, radix).map_err(|_| FormatError::BadNumber {
        field,
        text: text.to_owned(),
    })
}

fn optional_comment(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .filter(|c| !c.is_empty())
        .map(|c| (*c).to_owned())
}

fn decode_current(fields: &[&str]) -> Result<Record, FormatError> {
    let raw = hex_exact(fields, 2, 8, "8")?;
    let code = hex_exact(fields, 3, 4, "4")?;
    let address = hex_exact(fields, 4, 8, "8")?;
    let data = hex_exact(fields, 5, 8, "8")?;
    let extend = hex_exact(fields, 6, 8, "8")?;
    let location = u16::try_from(code)
        .ok()
        .and_then(Location::from_code)
        .ok_or(FormatError::UnknownLocation(code))?;

    let action = CheatAction::new(InstructionWord::from_raw(raw), location, address, data)
        .with_extend(extend)
        .with_name(fields[7]);
    Ok(Record::Cheat(CheatRecord {
        driver: fields[1].to_owned(),
        grammar: Grammar::Current,
        action,
        comment: optional_comment(fields, 8),
    }))
}

fn decode_region(fields: &[&str]) -> Result<Record, FormatError> {
    let code = hex_exact(fields, 3, 4, "4")?;
    let address = hex_exact(fields, 4, 8, "8")?;
    let length = hex_exact(fields, 5, 8, "8")?;
    let location = u16::try_from(code)
        .ok()
        .and_then(Location::from_code)
        .ok_or(FormatError::UnknownLocation(code))?;
    Ok(Record::Region(RegionRecord {
        driver: fields[1].to_owned(),
        region: SearchRegion::new(location, address, length, fields[6]),
    }))
}

fn decode_legacy(fields: &[&str], grammar: Grammar) -> Result<Record, FormatError> {
    let (cpu, address, data, mask, code, name_at, legacy_grammar) = match grammar {
        Grammar::LegacyB => (
            number_between(fields, 1, 2..=2, "2", 10)?,
            hex_exact(fields, 2, 8, "8")?,
            hex_exact(fields, 3, 8, "8")?,
            hex_exact(fields, 4, 8, "8")?,
            number_between(fields, 5, 1..=3, "1..=3", 10)?,
            6,
            LegacyGrammar::Extended,
        ),
        _ => (
            number_between(fields, 1, 1..=1, "1", 10)?,
            number_between(fields, 2, 1..=8, "1..=8", 16)?,
            hex_exact(fields, 3, 2, "2")?,
            0,
            number_between(fields, 4, 1..=3, "1..=3", 10)?,
            5,
            LegacyGrammar::Short,
        ),
    };
    let cpu = u8::try_from(cpu).map_err(|_| FormatError::BadNumber {
        field: 1,
        text: fields[1].to_owned(),
    })?;
    if code > LEGACY_CODE_MAX || legacy_to_current(code, cpu).is_none() {
        return Err(FormatError::UnknownLegacyCode(code));
    }

    let legacy = LegacyCode {
        code,
        cpu,
        mask,
        grammar: legacy_grammar,
    };
    let action = CheatAction::from_legacy(legacy, address, data).with_name(fields[name_at]);
    Ok(Record::Cheat(CheatRecord {
        driver: fields[0].to_owned(),
        grammar,
        action,
        comment: optional_comment(fields, name_at + 1),
    }))
}

/// Picks the grammar for a split line, in priority order.
fn classify(fields: &[&str]) -> Result<Grammar, FormatError> {
    let count = fields.len();
    if fields[0].is_empty() {
        return match count {
            8 | 9 => Ok(Grammar::Current),
            7 if fields[2] == REGION_TAG => Ok(Grammar::CurrentRegion),
            _ => Err(FormatError::FieldCount(count)),
        };
    }
    match (count, fields.get(1).map_or(0, |f| f.len())) {
        (7 | 8, 2) => Ok(Grammar::LegacyB),
        (6 | 7, 1) => Ok(Grammar::LegacyA),
        (6..=8, actual) => Err(FormatError::FieldWidth {
            field: 1,
            expected: "1 or 2",
            actual,
        }),
        _ => Err(FormatError::FieldCount(count)),
    }
}

/// Decodes one line, reporting why a non-blank line was rejected.
///
/// # Errors
///
/// Returns the [`FormatError`] of the first grammar rule the line breaks.
pub fn decode_line_checked(line: &str) -> Result<Option<Record>, FormatError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if is_ignorable(line) {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let record = match classify(&fields)? {
        Grammar::Current => decode_current(&fields)?,
        Grammar::CurrentRegion => decode_region(&fields)?,
        grammar @ (Grammar::LegacyB | Grammar::LegacyA) => decode_legacy(&fields, grammar)?,
    };
    Ok(Some(record))
}

/// Decodes one line; blank, comment and malformed lines yield `None`.
#[must_use]
pub fn decode_line(line: &str) -> Option<Record> {
    decode_line_checked(line).ok().flatten()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{decode_line, decode_line_checked, Grammar, Record};
    use crate::api::Location;
    use crate::encoding::{CodeType, LinkLevel};
    use crate::fault::FormatError;

    fn cheat(line: &str) -> super::CheatRecord {
        match decode_line(line) {
            Some(Record::Cheat(record)) => record,
            other => panic!("expected cheat record, got {other:?}"),
        }
    }

    #[test]
    fn current_record() {
        let record = cheat(":pacman:00000000:0000:00004E14:00000003:000000FF:Infinite Lives:keep 3");
        assert_eq!(record.grammar, Grammar::Current);
        assert_eq!(record.driver, "pacman");
        assert_eq!(record.action.address, 0x4E14);
        assert_eq!(record.action.data, 3);
        assert_eq!(record.action.extend_data, 0xFF);
        assert_eq!(record.action.name, "Infinite Lives");
        assert_eq!(record.comment.as_deref(), Some("keep 3"));
        assert_eq!(record.action.view().op(), Some(CodeType::Write));
    }

    #[test]
    fn region_record() {
        match decode_line(":pacman:RGN:1002:00000000:00000400:nvram") {
            Some(Record::Region(record)) => {
                assert_eq!(record.region.location, Location::region(2));
                assert_eq!(record.region.length, 0x400);
                assert_eq!(record.region.name, "nvram");
            }
            other => panic!("expected region, got {other:?}"),
        }
    }

    #[test]
    fn legacy_a_record() {
        let record = cheat("pacman:0:4E14:03:001:Infinite Lives");
        assert_eq!(record.grammar, Grammar::LegacyA);
        let view = record.action.view();
        assert_eq!(view.op(), Some(CodeType::Write));
        assert_eq!(view.location, Location::cpu(0));
        assert_eq!(view.data, 3);
    }

    #[test]
    fn legacy_b_linked_record() {
        let record = cheat("galaga:01:00008000:00000063:000000F0:502:Linked part:note");
        assert_eq!(record.grammar, Grammar::LegacyB);
        assert_eq!(record.action.link(), LinkLevel::Linked);
        assert_eq!(record.action.view().location, Location::cpu(1));
        assert_eq!(record.comment.as_deref(), Some("note"));
    }

    #[rstest]
    #[case("", None)]
    #[case("   ", None)]
    #[case("# comment", None)]
    fn ignorable_lines(#[case] line: &str, #[case] expected: Option<Record>) {
        assert_eq!(decode_line_checked(line), Ok(expected));
    }

    #[rstest]
    #[case(":d:0000:0000:00000000:00000000:00000000:n", FormatError::FieldWidth { field: 2, expected: "8", actual: 4 })]
    #[case(":d:00000000:0000", FormatError::FieldCount(4))]
    #[case("d:0:ZZ:03:001:n", FormatError::BadNumber { field: 2, text: "ZZ".to_owned() })]
    #[case("d:0:10:03:033:n", FormatError::UnknownLegacyCode(33))]
    #[case(":d:00000000:3000:00000000:00000000:00000000:n", FormatError::UnknownLocation(0x3000))]
    #[case("d:123:10:03:001:n", FormatError::FieldWidth { field: 1, expected: "1 or 2", actual: 3 })]
    fn malformed_lines(#[case] line: &str, #[case] expected: FormatError) {
        assert_eq!(decode_line_checked(line), Err(expected));
        assert_eq!(decode_line(line), None);
    }
}
