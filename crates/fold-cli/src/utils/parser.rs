use rosetta_fold::core::models::residue::Polymer;
use rosetta_fold::engine::config::TreeKind;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid chunk range '{0}'. Expected 'START-STOP' (e.g., '3-12').")]
    InvalidChunkRange(String),

    #[error("Unknown polymer '{0}'. Expected 'rna' or 'protein'.")]
    UnknownPolymer(String),

    #[error("Unknown fold tree '{0}'. Expected 'auto', 'star' or 'simple'.")]
    UnknownTree(String),

    #[error("FASTA input contains no sequence.")]
    EmptyFasta,
}

/// Parses `START-STOP` into an inclusive 1-based range.
pub fn parse_chunk_range(range: &str) -> Result<(usize, usize), ParseError> {
    let invalid = || ParseError::InvalidChunkRange(range.to_string());
    let (start, stop) = range.split_once('-').ok_or_else(invalid)?;
    let start = start.trim().parse().map_err(|_| invalid())?;
    let stop = stop.trim().parse().map_err(|_| invalid())?;
    Ok((start, stop))
}

pub fn parse_polymer(name: &str) -> Result<Polymer, ParseError> {
    match name.to_ascii_lowercase().as_str() {
        "rna" => Ok(Polymer::Rna),
        "protein" => Ok(Polymer::Protein),
        _ => Err(ParseError::UnknownPolymer(name.to_string())),
    }
}

pub fn parse_tree_kind(name: &str) -> Result<TreeKind, ParseError> {
    match name.to_ascii_lowercase().as_str() {
        "auto" => Ok(TreeKind::Auto),
        "star" => Ok(TreeKind::Star),
        "simple" => Ok(TreeKind::Simple),
        _ => Err(ParseError::UnknownTree(name.to_string())),
    }
}

/// Sequence of the first record of a FASTA text. Header lines start with `>`; input
/// without a header is read as a bare sequence.
pub fn parse_fasta(content: &str) -> Result<String, ParseError> {
    let mut sequence = String::new();
    let mut seen_header = false;
    for line in content.lines().map(str::trim) {
        if let Some(_header) = line.strip_prefix('>') {
            if seen_header && !sequence.is_empty() {
                break;
            }
            seen_header = true;
            continue;
        }
        if line.starts_with(';') {
            continue;
        }
        sequence.extend(line.chars().filter(|c| !c.is_whitespace()));
    }
    if sequence.is_empty() {
        return Err(ParseError::EmptyFasta);
    }
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_parse_with_and_without_spaces() {
        assert_eq!(parse_chunk_range("3-12"), Ok((3, 12)));
        assert_eq!(parse_chunk_range(" 1 - 5 "), Ok((1, 5)));
        assert!(matches!(
            parse_chunk_range("3:12"),
            Err(ParseError::InvalidChunkRange(_))
        ));
        assert!(parse_chunk_range("a-3").is_err());
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(parse_polymer("RNA"), Ok(Polymer::Rna));
        assert_eq!(parse_polymer("protein"), Ok(Polymer::Protein));
        assert!(parse_polymer("dna").is_err());
        assert_eq!(parse_tree_kind("Star"), Ok(TreeKind::Star));
        assert!(parse_tree_kind("ring").is_err());
    }

    #[test]
    fn fasta_reads_only_the_first_record() {
        let fasta = ">target\nggcg caag\nccgc\n>other\naaaa\n";
        assert_eq!(parse_fasta(fasta), Ok("ggcgcaagccgc".to_string()));
        assert_eq!(parse_fasta("gaga\n"), Ok("gaga".to_string()));
        assert_eq!(parse_fasta(">empty\n"), Err(ParseError::EmptyFasta));
    }
}
