use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{
    AnalysisRecord, CorrectionEvent, CorrectionExplanation, SentenceMovement, WordCorrection,
};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Analysis results: one row per job and kind
    for collection in [
        AnalysisRecord::TRANSCRIPTION_COLLECTION,
        AnalysisRecord::SUMMARY_COLLECTION,
    ] {
        create_indexes(
            db,
            collection,
            vec![
                index_unique(bson::doc! { "job": 1 }),
                index(bson::doc! { "created_at": -1 }),
            ],
        )
        .await?;
    }

    // Correction events
    create_indexes(
        db,
        CorrectionEvent::COLLECTION,
        vec![
            index_unique(bson::doc! { "prompt_id": 1 }),
            index(bson::doc! { "job_id": 1, "model_id": 1 }),
            index(bson::doc! { "occurred_at": -1 }),
        ],
    )
    .await?;

    // Explanations
    create_indexes(
        db,
        CorrectionExplanation::COLLECTION,
        vec![index(bson::doc! { "event_id": 1, "created_at": 1 })],
    )
    .await?;

    // Word corrections: duplicate word pairs within an event are no-ops
    create_indexes(
        db,
        WordCorrection::COLLECTION,
        vec![
            index_unique(bson::doc! { "event_id": 1, "before": 1, "after": 1 }),
            index(bson::doc! { "event_id": 1, "created_at": 1 }),
        ],
    )
    .await?;

    // Sentence movements
    create_indexes(
        db,
        SentenceMovement::COLLECTION,
        vec![index(bson::doc! { "event_id": 1, "created_at": 1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    match coll.create_indexes(indexes.clone()).await {
        Ok(_) => {
            info!(collection, "Indexes created");
            Ok(())
        }
        Err(e) => {
            // IndexKeySpecsConflict (code 86): an index with the same name exists
            // with different options (e.g. created before it became unique).
            if let mongodb::error::ErrorKind::Command(ref cmd_err) = *e.kind
                && cmd_err.code == 86
            {
                tracing::warn!(
                    collection,
                    "Index conflict detected, dropping conflicting indexes and retrying"
                );
                coll.drop_indexes().await?;
                coll.create_indexes(indexes).await?;
                info!(collection, "Indexes recreated after conflict resolution");
                return Ok(());
            }
            Err(e)
        }
    }
}
