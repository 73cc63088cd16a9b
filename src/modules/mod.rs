pub mod books;
pub mod students;

use school_kernel::{settings::Settings, ModuleRegistry};
use sqlx::SqlitePool;

/// Register all application modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    pool: &SqlitePool,
    settings: &Settings,
) -> anyhow::Result<()> {
    registry.register(students::create_module(pool.clone()));
    registry.register(books::create_module(pool.clone(), settings)?);
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use school_kernel::settings::{LibrarySettings, Settings};
    use school_kernel::ModuleRegistry;
    use sqlx::SqlitePool;

    pub fn settings() -> Settings {
        Settings {
            library: LibrarySettings {
                loan_period_days: Some(14),
                ..LibrarySettings::default()
            },
            ..Settings::default()
        }
    }

    pub async fn migrate(pool: &SqlitePool) {
        let mut registry = ModuleRegistry::new();
        super::register_all(&mut registry, pool, &settings()).unwrap();
        school_db::migrate(pool, &registry.collect_migrations())
            .await
            .unwrap();
    }

    /// Private in-memory database with every module's schema applied.
    pub async fn migrated_pool() -> SqlitePool {
        let pool = school_db::connect_in_memory().await.unwrap();
        migrate(&pool).await;
        pool
    }

    pub async fn add_student(pool: &SqlitePool, name: &str, admission_number: &str) -> String {
        let id = uuid::Uuid::now_v7().to_string();
        sqlx::query(
            "INSERT INTO students (id, name, admission_number, class_name, created_at) VALUES (?, ?, ?, 'Form 2', ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(admission_number)
        .bind(time::OffsetDateTime::now_utc())
        .execute(pool)
        .await
        .unwrap();
        id
    }
}
