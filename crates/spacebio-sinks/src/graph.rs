//! Neo4j knowledge-graph sink.
//!
//! One merge sequence per publication. Every statement is a MERGE so
//! re-persisting the same document is idempotent:
//!   (Publication)-[:STUDIES]->(Organism {name})
//!   (Publication)-[:TESTED_UNDER]->(Condition {type, value})
//!   (Publication)-[:MENTIONS]->(Entity {name, type})
//!   (Publication)-[:HAS_FINDING]->(Finding {text, publication_pmc_id, index})
//!   (Publication)-[:IDENTIFIES_GAP]->(KnowledgeGap {description})
//!   (Author {name})-[:AUTHORED]->(Publication)

use neo4rs::{query, ConfigBuilder, Graph};
use tracing::{debug, instrument};

use spacebio_common::config::Neo4jConfig;
use spacebio_enrich::EnrichedFacts;
use spacebio_ingestion::Document;

pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub async fn connect(cfg: &Neo4jConfig) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(&cfg.uri)
            .user(&cfg.user)
            .password(&cfg.password)
            .fetch_size(500)
            .max_connections(10)
            .build()?;
        let graph = Graph::connect(config).await?;
        Ok(Self { graph })
    }

    /// Merge one publication and all of its relations.
    #[instrument(skip(self, doc, facts), fields(pmc_id = %doc.pmc_id))]
    pub async fn merge_publication(
        &self,
        doc: &Document,
        facts: &EnrichedFacts,
    ) -> Result<(), neo4rs::Error> {
        let pmc_id = doc.pmc_id.as_str();
        let meta = &doc.metadata;

        self.graph
            .run(
                query(
                    "MERGE (p:Publication {pmc_id: $pmc_id})
                     SET p.title = $title,
                         p.abstract = $abstract,
                         p.journal = $journal,
                         p.publication_date = $publication_date,
                         p.doi = $doi,
                         p.pmid = $pmid,
                         p.hypothesis = $hypothesis",
                )
                .param("pmc_id", pmc_id)
                .param("title", meta.title.as_deref().unwrap_or(""))
                .param("abstract", meta.abstract_text.as_deref().unwrap_or(""))
                .param("journal", meta.journal.as_deref().unwrap_or(""))
                .param("publication_date", meta.publication_date.as_deref().unwrap_or(""))
                .param("doi", meta.doi.as_deref().unwrap_or(""))
                .param("pmid", meta.pmid.as_deref().unwrap_or(""))
                .param("hypothesis", facts.hypothesis.as_str()),
            )
            .await?;

        for organism in &facts.organisms {
            if organism.is_empty() {
                continue;
            }
            self.graph
                .run(
                    query(
                        "MERGE (o:Organism {name: $name})
                         WITH o
                         MATCH (p:Publication {pmc_id: $pmc_id})
                         MERGE (p)-[:STUDIES]->(o)",
                    )
                    .param("name", organism.as_str())
                    .param("pmc_id", pmc_id),
                )
                .await?;
        }

        for condition in &facts.space_conditions {
            self.graph
                .run(
                    query(
                        "MERGE (c:Condition {type: $type, value: $value})
                         WITH c
                         MATCH (p:Publication {pmc_id: $pmc_id})
                         MERGE (p)-[:TESTED_UNDER]->(c)",
                    )
                    .param("type", condition.kind.as_str())
                    .param("value", condition.value.as_str())
                    .param("pmc_id", pmc_id),
                )
                .await?;
        }

        for entity in &facts.entities {
            self.graph
                .run(
                    query(
                        "MERGE (e:Entity {name: $name, type: $type})
                         WITH e
                         MATCH (p:Publication {pmc_id: $pmc_id})
                         MERGE (p)-[:MENTIONS]->(e)",
                    )
                    .param("name", entity.name.as_str())
                    .param("type", entity.kind.as_str())
                    .param("pmc_id", pmc_id),
                )
                .await?;
        }

        // The finding index is part of the key: the same text at the same
        // position merges instead of duplicating.
        for (index, finding) in facts.key_findings.iter().enumerate() {
            if finding.is_empty() {
                continue;
            }
            self.graph
                .run(
                    query(
                        "MATCH (p:Publication {pmc_id: $pmc_id})
                         MERGE (f:Finding {text: $text, publication_pmc_id: $pmc_id, index: $index})
                         MERGE (p)-[:HAS_FINDING]->(f)",
                    )
                    .param("pmc_id", pmc_id)
                    .param("text", finding.as_str())
                    .param("index", index as i64),
                )
                .await?;
        }

        for gap in &facts.knowledge_gaps {
            if gap.is_empty() {
                continue;
            }
            self.graph
                .run(
                    query(
                        "MERGE (g:KnowledgeGap {description: $description})
                         WITH g
                         MATCH (p:Publication {pmc_id: $pmc_id})
                         MERGE (p)-[:IDENTIFIES_GAP]->(g)",
                    )
                    .param("description", gap.as_str())
                    .param("pmc_id", pmc_id),
                )
                .await?;
        }

        for author in &meta.authors {
            let name = author.full_name();
            if name.is_empty() {
                continue;
            }
            self.graph
                .run(
                    query(
                        "MERGE (a:Author {name: $name})
                         WITH a
                         MATCH (p:Publication {pmc_id: $pmc_id})
                         MERGE (a)-[:AUTHORED]->(p)",
                    )
                    .param("name", name)
                    .param("pmc_id", pmc_id),
                )
                .await?;
        }

        debug!("graph merged");
        Ok(())
    }
}
