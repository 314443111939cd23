//! Table definitions.

use super::{FieldDefault, FieldDefinition, FieldType, IndexDefinition, TableDefinition};

/// Logical table names.
pub mod names {
    /// Crawled knowledge sources.
    pub const SOURCES: &str = "sources";
    /// Embedded content chunks.
    pub const DOCUMENTS: &str = "documents";
    /// Key/value settings.
    pub const SETTINGS: &str = "settings";
    /// Projects.
    pub const PROJECTS: &str = "projects";
    /// Project tasks.
    pub const TASKS: &str = "tasks";
    /// Extracted code examples.
    pub const CODE_EXAMPLES: &str = "code_examples";
    /// Per-page metadata of crawled sources.
    pub const PAGE_METADATA: &str = "page_metadata";
    /// Raw crawled pages.
    pub const CRAWLED_PAGES: &str = "crawled_pages";
    /// Versioned snapshots of project documents.
    pub const DOCUMENT_VERSIONS: &str = "document_versions";
    /// Project to source links.
    pub const PROJECT_SOURCES: &str = "project_sources";
    /// Prompt templates.
    pub const PROMPTS: &str = "prompts";
    /// Applied schema migrations.
    pub const MIGRATIONS: &str = "migrations";
}

/// Embedding width of the default embedding model.
pub const EMBEDDING_DIMENSIONS: u32 = 1536;

const fn created_at() -> FieldDefinition {
    FieldDefinition::new("created_at", FieldType::Timestamp)
        .not_null()
        .with_default(FieldDefault::CurrentTimestamp)
}

const fn updated_at() -> FieldDefinition {
    FieldDefinition::new("updated_at", FieldType::Timestamp)
        .not_null()
        .with_default(FieldDefault::CurrentTimestamp)
}

const fn uuid_pk() -> FieldDefinition {
    FieldDefinition::new("id", FieldType::Uuid).primary_key()
}

const fn metadata() -> FieldDefinition {
    FieldDefinition::new("metadata", FieldType::Json)
        .not_null()
        .with_default(FieldDefault::EmptyObject)
}

/// Crawled knowledge sources, keyed by `source_id`.
pub const SOURCES: TableDefinition = TableDefinition {
    name: names::SOURCES,
    fields: &[
        FieldDefinition::new("source_id", FieldType::Text)
            .primary_key()
            .max_length(255),
        FieldDefinition::new("title", FieldType::Text),
        FieldDefinition::new("summary", FieldType::Text),
        FieldDefinition::new("total_word_count", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        metadata(),
        created_at(),
        updated_at(),
    ],
    indexes: &[IndexDefinition {
        name: "idx_sources_title",
        columns: &["title"],
        unique: false,
    }],
};

/// Embedded document chunks.
pub const DOCUMENTS: TableDefinition = TableDefinition {
    name: names::DOCUMENTS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("url", FieldType::Text).not_null(),
        FieldDefinition::new("chunk_number", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        FieldDefinition::new("content", FieldType::Text).not_null(),
        metadata(),
        FieldDefinition::new("source_id", FieldType::Text).not_null(),
        FieldDefinition::vector("embedding", EMBEDDING_DIMENSIONS),
        created_at(),
    ],
    indexes: &[
        IndexDefinition {
            name: "idx_documents_source_id",
            columns: &["source_id"],
            unique: false,
        },
        IndexDefinition {
            name: "idx_documents_url",
            columns: &["url"],
            unique: false,
        },
    ],
};

/// Application settings, unique on `key`.
pub const SETTINGS: TableDefinition = TableDefinition {
    name: names::SETTINGS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("key", FieldType::Text)
            .not_null()
            .unique()
            .max_length(255),
        FieldDefinition::new("value", FieldType::Text),
        FieldDefinition::new("encrypted_value", FieldType::Text),
        FieldDefinition::new("is_encrypted", FieldType::Boolean)
            .not_null()
            .with_default(FieldDefault::Bool(false)),
        FieldDefinition::new("category", FieldType::Text),
        FieldDefinition::new("description", FieldType::Text),
        created_at(),
        updated_at(),
    ],
    indexes: &[IndexDefinition {
        name: "idx_settings_category",
        columns: &["category"],
        unique: false,
    }],
};

/// Projects with JSON docs, features and data.
pub const PROJECTS: TableDefinition = TableDefinition {
    name: names::PROJECTS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("title", FieldType::Text).not_null(),
        FieldDefinition::new("description", FieldType::Text),
        FieldDefinition::new("docs", FieldType::Json)
            .not_null()
            .with_default(FieldDefault::EmptyArray),
        FieldDefinition::new("features", FieldType::Json)
            .not_null()
            .with_default(FieldDefault::EmptyArray),
        FieldDefinition::new("data", FieldType::Json)
            .not_null()
            .with_default(FieldDefault::EmptyArray),
        FieldDefinition::new("github_repo", FieldType::Text),
        FieldDefinition::new("pinned", FieldType::Boolean)
            .not_null()
            .with_default(FieldDefault::Bool(false)),
        created_at(),
        updated_at(),
    ],
    indexes: &[],
};

/// Project tasks with soft-delete columns.
pub const TASKS: TableDefinition = TableDefinition {
    name: names::TASKS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("project_id", FieldType::Uuid),
        FieldDefinition::new("parent_task_id", FieldType::Uuid),
        FieldDefinition::new("title", FieldType::Text).not_null(),
        FieldDefinition::new("description", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("")),
        FieldDefinition::new("status", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("todo")),
        FieldDefinition::new("assignee", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("User")),
        FieldDefinition::new("task_order", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        FieldDefinition::new("feature", FieldType::Text),
        FieldDefinition::new("sources", FieldType::Json)
            .not_null()
            .with_default(FieldDefault::EmptyArray),
        FieldDefinition::new("code_examples", FieldType::Json)
            .not_null()
            .with_default(FieldDefault::EmptyArray),
        FieldDefinition::new("archived", FieldType::Boolean)
            .not_null()
            .with_default(FieldDefault::Bool(false)),
        FieldDefinition::new("archived_at", FieldType::Timestamp),
        FieldDefinition::new("archived_by", FieldType::Text),
        created_at(),
        updated_at(),
    ],
    indexes: &[
        IndexDefinition {
            name: "idx_tasks_project_id",
            columns: &["project_id"],
            unique: false,
        },
        IndexDefinition {
            name: "idx_tasks_status",
            columns: &["status"],
            unique: false,
        },
        IndexDefinition {
            name: "idx_tasks_archived",
            columns: &["archived"],
            unique: false,
        },
    ],
};

/// Code examples extracted from crawled pages.
pub const CODE_EXAMPLES: TableDefinition = TableDefinition {
    name: names::CODE_EXAMPLES,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("url", FieldType::Text).not_null(),
        FieldDefinition::new("chunk_number", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        FieldDefinition::new("content", FieldType::Text).not_null(),
        FieldDefinition::new("summary", FieldType::Text),
        metadata(),
        FieldDefinition::new("source_id", FieldType::Text).not_null(),
        FieldDefinition::vector("embedding", EMBEDDING_DIMENSIONS),
        created_at(),
    ],
    indexes: &[IndexDefinition {
        name: "idx_code_examples_source_id",
        columns: &["source_id"],
        unique: false,
    }],
};

/// Per-page metadata, unique on `url`.
pub const PAGE_METADATA: TableDefinition = TableDefinition {
    name: names::PAGE_METADATA,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("source_id", FieldType::Text).not_null(),
        FieldDefinition::new("url", FieldType::Text).not_null().unique(),
        FieldDefinition::new("full_content", FieldType::Text),
        FieldDefinition::new("section_title", FieldType::Text),
        FieldDefinition::new("section_order", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        FieldDefinition::new("word_count", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        FieldDefinition::new("char_count", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        FieldDefinition::new("chunk_count", FieldType::Integer)
            .not_null()
            .with_default(FieldDefault::Integer(0)),
        metadata(),
        created_at(),
        updated_at(),
    ],
    indexes: &[IndexDefinition {
        name: "idx_page_metadata_source_id",
        columns: &["source_id"],
        unique: false,
    }],
};

/// Raw crawled pages, unique on `(url, source_id)`.
pub const CRAWLED_PAGES: TableDefinition = TableDefinition {
    name: names::CRAWLED_PAGES,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("url", FieldType::Text).not_null(),
        FieldDefinition::new("source_id", FieldType::Text).not_null(),
        FieldDefinition::new("title", FieldType::Text),
        FieldDefinition::new("content", FieldType::Text),
        FieldDefinition::new("status_code", FieldType::Integer),
        metadata(),
        created_at(),
        updated_at(),
    ],
    indexes: &[IndexDefinition {
        name: "idx_crawled_pages_url_source",
        columns: &["url", "source_id"],
        unique: true,
    }],
};

/// Versioned snapshots of project JSON fields.
pub const DOCUMENT_VERSIONS: TableDefinition = TableDefinition {
    name: names::DOCUMENT_VERSIONS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("project_id", FieldType::Uuid),
        FieldDefinition::new("task_id", FieldType::Uuid),
        FieldDefinition::new("field_name", FieldType::Text).not_null(),
        FieldDefinition::new("version_number", FieldType::Integer).not_null(),
        FieldDefinition::new("content", FieldType::Json).not_null(),
        FieldDefinition::new("change_summary", FieldType::Text),
        FieldDefinition::new("change_type", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("update")),
        FieldDefinition::new("created_by", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("system")),
        created_at(),
    ],
    indexes: &[IndexDefinition {
        name: "idx_document_versions_project_field",
        columns: &["project_id", "field_name"],
        unique: false,
    }],
};

/// Links between projects and sources.
pub const PROJECT_SOURCES: TableDefinition = TableDefinition {
    name: names::PROJECT_SOURCES,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("project_id", FieldType::Uuid).not_null(),
        FieldDefinition::new("source_id", FieldType::Text).not_null(),
        FieldDefinition::new("notes", FieldType::Text),
        FieldDefinition::new("created_by", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("system")),
        FieldDefinition::new("linked_at", FieldType::Timestamp)
            .not_null()
            .with_default(FieldDefault::CurrentTimestamp),
    ],
    indexes: &[IndexDefinition {
        name: "idx_project_sources_pair",
        columns: &["project_id", "source_id"],
        unique: true,
    }],
};

/// Prompt templates, unique on `prompt_name`.
pub const PROMPTS: TableDefinition = TableDefinition {
    name: names::PROMPTS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("prompt_name", FieldType::Text)
            .not_null()
            .unique(),
        FieldDefinition::new("prompt", FieldType::Text).not_null(),
        FieldDefinition::new("description", FieldType::Text),
        created_at(),
        updated_at(),
    ],
    indexes: &[],
};

/// Applied schema migrations.
pub const MIGRATIONS: TableDefinition = TableDefinition {
    name: names::MIGRATIONS,
    fields: &[
        uuid_pk(),
        FieldDefinition::new("version", FieldType::Text)
            .not_null()
            .unique(),
        FieldDefinition::new("migration_name", FieldType::Text).not_null(),
        FieldDefinition::new("checksum", FieldType::Text).not_null(),
        FieldDefinition::new("applied_at", FieldType::Timestamp)
            .not_null()
            .with_default(FieldDefault::CurrentTimestamp),
        FieldDefinition::new("applied_by", FieldType::Text)
            .not_null()
            .with_default(FieldDefault::Text("system")),
    ],
    indexes: &[],
};

const CANONICAL: [TableDefinition; 6] =
    [SOURCES, DOCUMENTS, SETTINGS, PROJECTS, TASKS, CODE_EXAMPLES];

const STORAGE: [TableDefinition; 12] = [
    SOURCES,
    DOCUMENTS,
    SETTINGS,
    PROJECTS,
    TASKS,
    CODE_EXAMPLES,
    PAGE_METADATA,
    CRAWLED_PAGES,
    DOCUMENT_VERSIONS,
    PROJECT_SOURCES,
    PROMPTS,
    MIGRATIONS,
];

/// The six domain tables every backend must be able to represent.
#[must_use]
pub const fn canonical_tables() -> &'static [TableDefinition] {
    &CANONICAL
}

/// Every table the repository contract touches.
#[must_use]
pub const fn storage_tables() -> &'static [TableDefinition] {
    &STORAGE
}

/// Looks up a storage table by logical name.
#[must_use]
pub fn storage_table(name: &str) -> Option<&'static TableDefinition> {
    STORAGE.iter().find(|t| t.name == name)
}
