// [libs/infra/db/src/repositories/asset/queries.rs]

//! SQL text for [`super::AssetRepository`].

pub const SELECT_BY_NATURAL_KEY: &str = r#"
    SELECT id, project_id, root_domain, kind, natural_key, tags, data,
           task_name, created_at, updated_at, last_scan_time
    FROM assets WHERE project_id = ?1 AND kind = ?2 AND natural_key = ?3
"#;

pub const SELECT_BY_ID: &str = r#"
    SELECT id, project_id, root_domain, kind, natural_key, tags, data,
           task_name, created_at, updated_at, last_scan_time
    FROM assets WHERE id = ?1
"#;

pub const SELECT_BY_PROJECT: &str = r#"
    SELECT id, project_id, root_domain, kind, natural_key, tags, data,
           task_name, created_at, updated_at, last_scan_time
    FROM assets WHERE project_id = ?1 ORDER BY updated_at DESC
"#;

pub const INSERT_ASSET: &str = r#"
    INSERT INTO assets (
        id, project_id, root_domain, kind, natural_key, tags, data,
        task_name, created_at, updated_at, last_scan_time
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

pub const UPDATE_ASSET: &str = r#"
    UPDATE assets SET
        tags = ?2, data = ?3, task_name = ?4, updated_at = ?5, last_scan_time = ?6
    WHERE id = ?1
"#;

pub const DELETE_ASSET: &str = r#"DELETE FROM assets WHERE id = ?1"#;

pub const INSERT_RELATION: &str = r#"
    INSERT INTO asset_relations (id, project_id, src_asset_id, dst_asset_id, relation_type, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

pub const SELECT_RELATIONS_FROM: &str = r#"
    SELECT id, project_id, src_asset_id, dst_asset_id, relation_type, created_at
    FROM asset_relations WHERE src_asset_id = ?1
"#;
