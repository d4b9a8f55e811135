use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::ChatRoom;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Chat rooms: one room per (client, technician, intervention)
    create_indexes(
        db,
        ChatRoom::COLLECTION,
        vec![
            index_unique(bson::doc! { "client_id": 1, "technician_id": 1, "intervention_id": 1 }),
            index(bson::doc! { "technician_id": 1, "updated_at": -1 }),
            index(bson::doc! { "client_id": 1, "updated_at": -1 }),
            index(bson::doc! { "messages._id": 1 }),
        ],
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
            // IndexKeySpecsConflict (code 86): same name, different options.
            if let mongodb::error::ErrorKind::Command(ref cmd_err) = *e.kind {
                if cmd_err.code == 86 {
                    tracing::warn!(
                        collection,
                        "Index conflict detected, dropping conflicting indexes and retrying"
                    );
                    coll.drop_indexes().await?;
                    coll.create_indexes(indexes).await?;
                    info!(collection, "Indexes recreated after conflict resolution");
                    return Ok(());
                }
            }
            Err(e)
        }
    }
}
