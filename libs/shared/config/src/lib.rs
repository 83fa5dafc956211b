use std::env;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub sri: SriConfig,
}

/// Static emitter data required by the SRI e-invoicing workflow.
///
/// The access key and factura XML embed these verbatim, so they must match
/// the RUC registration. `mock` keeps the authorization step local and
/// deterministic; real submission to the SRI web service is not wired up.
#[derive(Debug, Clone)]
pub struct SriConfig {
    pub mock: bool,
    pub ambiente: String,
    pub ruc: String,
    pub razon_social: String,
    pub nombre_comercial: String,
    pub direccion_matriz: String,
    pub direccion_establecimiento: Option<String>,
    pub establecimiento: String,
    pub punto_emision: String,
    pub obligado_contabilidad: String,
    pub contribuyente_especial: Option<String>,
    pub document_root: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            sri: SriConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl SriConfig {
    pub fn from_env() -> Self {
        Self {
            mock: env::var("SRI_MOCK")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            ambiente: env::var("SRI_AMBIENTE").unwrap_or_else(|_| "Pruebas".to_string()),
            ruc: env::var("SRI_RUC").unwrap_or_else(|_| "0999999999001".to_string()),
            razon_social: env::var("SRI_RAZON_SOCIAL")
                .unwrap_or_else(|_| "CONSULTORIO DENTAL DR. CARLOS MENDOZA".to_string()),
            nombre_comercial: env::var("SRI_NOMBRE_COMERCIAL")
                .unwrap_or_else(|_| "MEDICSYS Dental".to_string()),
            direccion_matriz: env::var("SRI_DIRECCION_MATRIZ")
                .unwrap_or_else(|_| "Av. Principal 123 y Secundaria, Cuenca - Ecuador".to_string()),
            direccion_establecimiento: env::var("SRI_DIRECCION_ESTABLECIMIENTO").ok(),
            establecimiento: env::var("SRI_ESTABLECIMIENTO").unwrap_or_else(|_| "001".to_string()),
            punto_emision: env::var("SRI_PUNTO_EMISION").unwrap_or_else(|_| "001".to_string()),
            obligado_contabilidad: env::var("SRI_OBLIGADO_CONTABILIDAD")
                .unwrap_or_else(|_| "SI".to_string()),
            contribuyente_especial: env::var("SRI_CONTRIBUYENTE_ESPECIAL").ok(),
            document_root: env::var("SRI_DOCUMENT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage").join("facturacion")),
        }
    }

    pub fn is_produccion(&self) -> bool {
        self.ambiente.eq_ignore_ascii_case("Produccion")
    }
}
