//! End-to-end tests of the analysis pipeline on plain-text documents.

use refstyle_core::{Boundary, CitationStyle, Component, Document, SectionOutcome};
use refstyle_parsing::{ParsingConfigBuilder, ReferenceAnalyzer};

const IEEE_PAPER: &str = "\
A Study of Things
Introduction
Deep learning [1] has grown quickly. Graph methods [2] followed.

References
[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural Netw., vol. 12, no. 3, pp. 45-60, 2021.
[2] B. Jones and C. Lee, \"Graph Methods for Classifi-
cation,\" in Proc. ICML, 2020, pp. 1-9.
[3] D. Kim, \"Attention Everywhere,\" IEEE Access, vol. 5, pp. 10-20, 2019.
";

#[test]
fn ieee_paper_end_to_end() -> anyhow::Result<()> {
    let analysis = ReferenceAnalyzer::new().analyze_text(IEEE_PAPER)?;

    let section = analysis.section.section().expect("section found");
    assert_eq!(
        section.boundary,
        Boundary::Header {
            line: 4,
            header: "References".into()
        }
    );
    assert_eq!(analysis.entries.len(), 3);
    assert!(
        analysis
            .entries
            .iter()
            .all(|e| e.style_match.style == Some(CitationStyle::Ieee))
    );
    assert!(analysis.consistency.is_consistent());
    assert_eq!(analysis.consistency.dominant, Some(CitationStyle::Ieee));

    let first = &analysis.entries[0];
    assert_eq!(first.components.get(Component::Title), Some("Deep Learning Basics"));
    assert_eq!(first.components.get(Component::Year), Some("2021"));
    assert!(first.validation.is_valid());

    assert_eq!(analysis.in_text.numeric, vec![1, 2]);
    assert_eq!(analysis.in_text.uncited, vec![3]);
    assert!(analysis.in_text.unresolved.is_empty());
    Ok(())
}

#[test]
fn apa_entry_classified_with_high_confidence() -> anyhow::Result<()> {
    let text = "Body text.\nReferences\nSmith, J. (2020). Learning theory. Journal of AI, 5(2), 100-120.\n";
    let analysis = ReferenceAnalyzer::new().analyze_text(text)?;
    assert_eq!(analysis.entries.len(), 1);
    let m = &analysis.entries[0].style_match;
    assert_eq!(m.style, Some(CitationStyle::Apa));
    assert!(m.confidence >= 0.8);
    Ok(())
}

#[test]
fn page_number_fused_to_header() -> anyhow::Result<()> {
    let text = "Conclusion text.\n19REFERENCES\n[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans., vol. 1, pp. 1-2, 2021.\n[2] B. Jones, \"Graph Methods,\" in Proc. ICML, pp. 1-9, 2020.";
    let analysis = ReferenceAnalyzer::new().analyze_text(text)?;
    match &analysis.section {
        SectionOutcome::Found(s) => assert!(matches!(s.boundary, Boundary::Header { line: 1, .. })),
        SectionOutcome::NotFound => panic!("expected a section"),
    }
    assert_eq!(analysis.entries.len(), 2);
    Ok(())
}

#[test]
fn n_numbered_entries_give_n_entries() -> anyhow::Result<()> {
    let n = 12;
    let mut text = String::from("Body.\nReferences\n");
    for i in 1..=n {
        text.push_str(&format!(
            "[{i}] A. Author, \"Title number {i},\" J. Stuff, vol. {i}, pp. 1-9, 2020.\n"
        ));
    }
    let analysis = ReferenceAnalyzer::new().analyze_text(&text)?;
    assert_eq!(analysis.entries.len(), n as usize);
    let numbers: Vec<u32> = analysis.entries.iter().filter_map(|e| e.entry.number).collect();
    assert_eq!(numbers, (1..=n).collect::<Vec<u32>>());
    Ok(())
}

#[test]
fn analysis_is_idempotent() -> anyhow::Result<()> {
    let analyzer = ReferenceAnalyzer::new();
    let doc = Document::from_text(IEEE_PAPER);
    assert_eq!(analyzer.analyze(&doc)?, analyzer.analyze(&doc)?);
    Ok(())
}

#[test]
fn missing_year_reported_as_missing() -> anyhow::Result<()> {
    let text = "Body.\nReferences\n[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural Netw., vol. 12, no. 3, pp. 45-60.\n";
    let analysis = ReferenceAnalyzer::new().analyze_text(text)?;
    let entry = &analysis.entries[0];
    assert_eq!(entry.components.display(Component::Year), "missing");
    assert!(
        entry
            .validation
            .warnings()
            .any(|i| i.message == "Missing publication year")
    );
    Ok(())
}

#[test]
fn mixed_styles_flagged() -> anyhow::Result<()> {
    let text = "Body.\nReferences\n\
                Smith, J. (2020). Learning theory. Journal of AI, 5(2), 100-120.\n\
                \n\
                Doe, J. (2019). Graph theory. Journal of Graphs, 3(1), 1-20.\n\
                \n\
                Smith, John, and Jane Doe. \"Learning Theory Revisited.\" Journal of AI, vol. 12, no. 3, 2019, pp. 45-60.\n";
    let analysis = ReferenceAnalyzer::new().analyze_text(text)?;
    assert_eq!(analysis.entries.len(), 3);
    assert_eq!(analysis.consistency.dominant, Some(CitationStyle::Apa));
    assert_eq!(
        analysis.consistency.warning.as_deref(),
        Some("Mixed citation styles: mostly APA (2), but also MLA (1)")
    );

    let shares = analysis.style_distribution();
    assert_eq!(shares[0].style, Some(CitationStyle::Apa));
    let total: f64 = shares.iter().map(|s| s.percentage).sum();
    assert!((total - 100.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn multi_page_text_with_page_artifacts() -> anyhow::Result<()> {
    let text = "--- Page 1 ---\nIntro [1].\n--- Page 2 ---\nReferences\n[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans., vol. 1, pp. 1-2, 2021.\n2\n--- Page 3 ---\n[2] B. Jones, \"Graph Methods,\" in Proc. ICML, pp. 1-9, 2020.\n";
    let doc = Document::from_text(text);
    assert_eq!(doc.page_count(), 3);
    let analysis = ReferenceAnalyzer::new().analyze(&doc)?;
    assert_eq!(analysis.entries.len(), 2);
    assert!(!analysis.entries[0].entry.text.ends_with('2'));
    Ok(())
}

#[test]
fn custom_threshold_marks_entries_unknown() -> anyhow::Result<()> {
    let config = ParsingConfigBuilder::new().min_confidence(0.99).build()?;
    let analysis = ReferenceAnalyzer::with_config(config).analyze_text(IEEE_PAPER)?;
    assert!(analysis.entries.iter().all(|e| e.style_match.style.is_none()));
    assert_eq!(analysis.consistency.dominant, None);
    assert!((analysis.min_confidence - 0.99).abs() < f64::EPSILON);
    Ok(())
}
