//! Conversion from advisory records to Tantivy documents.

use tantivy::TantivyDocument;

use advisory_types::Advisory;

use crate::schema::AdvisorySchema;

/// Flatten an advisory into an indexable document.
///
/// `id` is the store key (filename-derived), kept distinct from the CVE
/// identifier inside the record.
pub fn advisory_to_doc(schema: &AdvisorySchema, id: &str, advisory: &Advisory) -> TantivyDocument {
    let mut doc = TantivyDocument::default();

    doc.add_text(schema.id, id);
    doc.add_text(schema.cve_id, &advisory.cve_metadata.cve_id);
    doc.add_text(schema.title, &advisory.containers.cna.title);
    doc.add_text(schema.description, description_text(advisory));

    for affected in &advisory.containers.cna.affected {
        if !affected.vendor.is_empty() {
            doc.add_text(schema.vendor, &affected.vendor);
        }
        if !affected.product.is_empty() {
            doc.add_text(schema.product, &affected.product);
        }
    }

    if let Some(severity) = advisory.severity() {
        doc.add_text(schema.severity, severity);
    }

    let published = tantivy::DateTime::from_timestamp_millis(
        advisory.published_at().timestamp_millis(),
    );
    doc.add_date(schema.published, published);

    doc
}

/// Searchable free text: description values plus problem-type descriptions.
fn description_text(advisory: &Advisory) -> String {
    let cna = &advisory.containers.cna;
    let mut parts: Vec<&str> = cna.descriptions.iter().map(|d| d.value.as_str()).collect();
    for problem in &cna.problem_types {
        parts.extend(problem.descriptions.iter().map(|d| d.description.as_str()));
    }
    parts.retain(|s| !s.is_empty());
    parts.join("\n")
}
