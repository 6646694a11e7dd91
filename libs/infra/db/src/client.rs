// [libs/infra/db/src/client.rs]
/*!
 * Gestion de enlaces a libSQL y aplicacion del esquema de arranque.
 *
 * En modo memoria (`mode=memory&cache=shared`), libSQL purga el
 * esquema en cuanto la ultima conexion se cierra; este cliente abre
 * una conexion ancla al inicio y la retiene durante toda la vida del
 * proceso para que el esquema permanezca visible entre hilos.
 */

use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, error, instrument};

#[derive(Clone)]
pub struct GridDbClient {
    driver: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl GridDbClient {
    #[instrument(skip(access_token))]
    pub async fn connect(connection_url: &str, access_token: Option<String>) -> Result<Self, DbError> {
        if connection_url.is_empty() {
            return Err(DbError::ConfigurationError("GRIDX_DATABASE_URL is empty".into()));
        }

        info!("🔌 [DATABASE]: Opening libSQL link to [{}]", connection_url);

        let is_remote = connection_url.starts_with("libsql://") || connection_url.starts_with("https://");
        let is_memory = connection_url.contains(":memory:") || connection_url.contains("mode=memory");

        let driver = if is_remote {
            let token = access_token.ok_or_else(|| {
                DbError::ConfigurationError("remote database URL requires an access token".into())
            })?;
            Builder::new_remote(connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(connection_url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let driver = Arc::new(driver);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = driver.connect().map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&anchor_conn).await?;
            anchor = Some(Arc::new(anchor_conn));
            info!("⚓ [DATABASE]: In-memory schema anchored for the lifetime of this process.");
        } else {
            let bootstrap = driver.connect().map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&bootstrap).await?;
        }

        Ok(Self { driver, _memory_anchor: anchor })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.driver.connect().map_err(|e| {
            error!("⚠️ [DATABASE]: Connection checkout failed: {}", e);
            DbError::ConnectionError(e.to_string())
        })
    }

    /// Abre un `UnitOfWork`: la unica superficie por la que un debito/credito
    /// y una mutacion de Job pueden comprometerse o revertirse juntos.
    pub async fn unit_of_work(&self) -> Result<crate::unit_of_work::UnitOfWork, DbError> {
        crate::unit_of_work::UnitOfWork::begin(self).await
    }
}
