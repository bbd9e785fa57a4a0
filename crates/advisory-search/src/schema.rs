//! Tantivy schema for advisory documents.
//!
//! Identifier fields use the raw tokenizer for exact lookup, free-text
//! fields go through the default analyzer, and the publish date is a fast
//! field so sorted-limited recency queries avoid a full scan.

use tantivy::schema::{DateOptions, Field, Schema, STORED, STRING, TEXT};

use crate::error::SearchError;

/// Schema field handles for efficient access.
#[derive(Debug, Clone)]
pub struct AdvisorySchema {
    schema: Schema,
    /// Document identifier, the store key (STRING | STORED)
    pub id: Field,
    /// CVE identifier from the record metadata (STRING | STORED)
    pub cve_id: Field,
    /// Advisory title (TEXT | STORED)
    pub title: Field,
    /// Descriptions and problem-type text (TEXT)
    pub description: Field,
    /// Affected vendor names (TEXT)
    pub vendor: Field,
    /// Affected product names (TEXT)
    pub product: Field,
    /// CVSS base severity (STRING | STORED)
    pub severity: Field,
    /// Publish timestamp (date, indexed + stored + fast)
    pub published: Field,
}

impl AdvisorySchema {
    /// Get the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Recover field handles from an existing Tantivy schema.
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {name} field")))
        };

        Ok(Self {
            id: field("id")?,
            cve_id: field("cve_id")?,
            title: field("title")?,
            description: field("description")?,
            vendor: field("vendor")?,
            product: field("product")?,
            severity: field("severity")?,
            published: field("published")?,
            schema,
        })
    }

    /// Fields the query parser searches when no field is named in a query.
    pub fn default_search_fields(&self) -> Vec<Field> {
        vec![
            self.id,
            self.cve_id,
            self.title,
            self.description,
            self.vendor,
            self.product,
        ]
    }
}

/// Build the advisory search schema.
pub fn build_advisory_schema() -> AdvisorySchema {
    let mut schema_builder = Schema::builder();

    let id = schema_builder.add_text_field("id", STRING | STORED);
    let cve_id = schema_builder.add_text_field("cve_id", STRING | STORED);
    let title = schema_builder.add_text_field("title", TEXT | STORED);
    let description = schema_builder.add_text_field("description", TEXT);
    let vendor = schema_builder.add_text_field("vendor", TEXT);
    let product = schema_builder.add_text_field("product", TEXT);
    let severity = schema_builder.add_text_field("severity", STRING | STORED);

    let published = schema_builder.add_date_field(
        "published",
        DateOptions::default().set_indexed().set_stored().set_fast(),
    );

    let schema = schema_builder.build();

    AdvisorySchema {
        schema,
        id,
        cve_id,
        title,
        description,
        vendor,
        product,
        severity,
        published,
    }
}
