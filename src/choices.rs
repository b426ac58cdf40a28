use crate::transport::ReferenceGenome;
use regex::Regex;
use std::io::{self, Write};
use std::sync::LazyLock;

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d+$").expect("static regex"));

const PROPERTY_PREFIX: &str = "pipeline.parameters.islandviewerclient.islandviewerclient-accession";

const PROPERTIES_HEADER: &[&str] = &[
    "pipeline.title.IslandViewerClient=IslandViewer Genomic Island Prediction Pipeline",
    "pipeline.h1.IslandViewerClient=IslandViewer Genomic Island Prediction",
    "",
    "workflow.islandviewerclient.title=IslandViewer Genomic Island Prediction",
    "workflow.islandviewerclient.description=IslandViewer is a computational tool that integrates four different genomic island prediction methods: IslandPick, IslandPath-DIMOB, SIGI-HMM, and Islander.",
    "",
    "pipeline.parameters.modal-title.islandviewerclient=IslandViewer Pipeline Parameters",
    "pipeline.parameters.islandviewerclient.islandviewerclient-accession=RefSeq Accession (Reference)",
    "pipeline.parameters.islandviewerclient.islandviewerclient-token=Authentication Token",
    "pipeline.parameters.islandviewerclient.read-merge-min-overlap=The minimum overlap of paired reads to merge.",
    "pipeline.parameters.islandviewerclient.read-merge-max-overlap=The maximum overlap of paired reads to merge.",
    "pipeline.parameters.islandviewerclient.assembly-kmers=Comma-separated k-mer values to use for assembly with SPAdes",
    "pipeline.parameters.islandviewerclient.assembly-contig-min-length=Minimum contig length to keep from an assembly.",
    "pipeline.parameters.islandviewerclient.assembly-contig-min-coverage-ratio=The minimum coverage ratio compared to the average coverage for a contig to be included.",
    "pipeline.parameters.islandviewerclient.assembly-contig-min-repeat-coverage-ratio=The minimum coverage ratio compared to the average coverage for a contig to be considered a repeat.",
    "pipeline.parameters.islandviewerclient.assembly-contig-min-length-coverage-calculation=The minimum length of a contig to be used for calculating the average coverage.",
    "pipeline.parameters.islandviewerclient.annotation-similarity-e-value-cutoff=The e-value cutoff for annotation with Prokka.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceEntry {
    pub key: String,
    pub accession: String,
    pub name: String,
}

pub struct ChoiceSinks<'a> {
    pub choices: &'a mut dyn Write,
    pub properties: &'a mut dyn Write,
    pub listing: &'a mut dyn Write,
}

pub fn strip_version(accession: &str) -> String {
    VERSION_SUFFIX.replace(accession, "").into_owned()
}

pub fn entries(genomes: &[ReferenceGenome]) -> Vec<ChoiceEntry> {
    let mut out: Vec<ChoiceEntry> = genomes
        .iter()
        .map(|g| ChoiceEntry {
            key: strip_version(&g.ref_accnum),
            accession: g.ref_accnum.clone(),
            name: g.name.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.accession.cmp(&b.accession)));
    out
}

pub fn render(genomes: &[ReferenceGenome], sinks: &mut ChoiceSinks<'_>) -> io::Result<usize> {
    for line in PROPERTIES_HEADER {
        writeln!(sinks.properties, "{line}")?;
    }

    let rows = entries(genomes);
    for e in &rows {
        let name = single_line(&e.name);
        writeln!(sinks.listing, "{}\t{}", e.key, name)?;
        writeln!(
            sinks.choices,
            "<choice name=\"{}\" value=\"{}\"/>",
            xml_attr(&e.key),
            xml_attr(&e.accession)
        )?;
        writeln!(sinks.properties, "{PROPERTY_PREFIX}.{}={}", e.key, name)?;
    }

    sinks.choices.flush()?;
    sinks.properties.flush()?;
    sinks.listing.flush()?;
    Ok(rows.len())
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn xml_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
