// libs/billing-cell/src/services/sri.rs
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use shared_config::SriConfig;

use crate::models::{BillingError, Invoice, SriEnvironment};

pub const STATUS_AUTORIZADO: &str = "AUTORIZADO";
pub const STATUS_RECHAZADO: &str = "RECHAZADO";
pub const STATUS_PENDIENTE: &str = "PENDIENTE";

const DIR_GENERADOS: &str = "Doc Generados";
const DIR_FIRMADOS: &str = "Doc Firmados";
const DIR_RESPUESTAS: &str = "Doc Respuestas";
const DIR_AUTORIZADOS: &str = "Doc Autorizados";

#[derive(Debug, Clone)]
pub struct SriSendResult {
    pub status: String,
    pub access_key: String,
    pub authorization_number: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub messages: Option<String>,
    pub generated_xml_path: PathBuf,
    pub signed_xml_path: PathBuf,
    pub response_xml_path: PathBuf,
    pub authorized_xml_path: Option<PathBuf>,
}

/// Módulo-11 check digit over a numeric string, weights cycling 2..7 from
/// the rightmost digit. 11 maps to "0" and 10 maps to "1" per the SRI table.
pub fn modulo11_check_digit(digits: &str) -> String {
    let mut factor = 2u32;
    let mut sum = 0u32;

    for ch in digits.chars().rev() {
        sum += ch.to_digit(10).unwrap_or(0) * factor;
        factor = if factor == 7 { 2 } else { factor + 1 };
    }

    match 11 - (sum % 11) {
        11 => "0".to_string(),
        10 => "1".to_string(),
        digit => digit.to_string(),
    }
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Splits any `]]>` so the payload survives inside a CDATA section.
pub fn escape_cdata(value: &str) -> String {
    value.replace("]]>", "]]]]><![CDATA[>")
}

fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

pub struct SriService {
    config: SriConfig,
}

impl SriService {
    pub fn new(config: &SriConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Runs the full mock protocol for one invoice: access key, factura XML,
    /// mock signature, reception response and (when authorized) the
    /// autorización document. All four land under the document root.
    pub fn send_invoice(
        &self,
        invoice: &Invoice,
        environment: SriEnvironment,
    ) -> Result<SriSendResult, BillingError> {
        let access_key = self.generate_access_key(invoice.issued_at, invoice.sequential, environment);
        let xml = self.build_invoice_xml(invoice, &access_key, environment);
        let base_name = build_base_file_name(&invoice.number, &access_key, Utc::now());

        let generated_xml_path = self.write_document(DIR_GENERADOS, &base_name, &xml)?;
        // Real XAdES signing is out of scope; the mock keeps the document as-is.
        let signed_xml = xml.clone();
        let signed_xml_path = self.write_document(DIR_FIRMADOS, &base_name, &signed_xml)?;

        if !self.config.mock {
            let response_xml = build_reception_response_xml(
                STATUS_PENDIENTE,
                &access_key,
                Some("Envío real al SRI no configurado."),
            );
            let response_xml_path = self.write_document(DIR_RESPUESTAS, &base_name, &response_xml)?;

            warn!(
                "SRI {} real no configurado, factura {} queda PENDIENTE",
                environment.label(),
                invoice.number
            );
            return Ok(SriSendResult {
                status: STATUS_PENDIENTE.to_string(),
                access_key,
                authorization_number: None,
                authorized_at: None,
                messages: Some("Envío real al SRI no configurado.".to_string()),
                generated_xml_path,
                signed_xml_path,
                response_xml_path,
                authorized_xml_path: None,
            });
        }

        let authorized = invoice.total > 0.0;
        let status = if authorized { STATUS_AUTORIZADO } else { STATUS_RECHAZADO };
        let message = if authorized {
            None
        } else {
            Some("Monto inválido para autorización.".to_string())
        };

        let response_xml = build_reception_response_xml(status, &access_key, message.as_deref());
        let response_xml_path = self.write_document(DIR_RESPUESTAS, &base_name, &response_xml)?;

        let (authorization_number, authorized_at, authorized_xml_path) = if authorized {
            let now = Utc::now();
            let number = generate_authorization_number(now);
            let authorization_xml =
                build_authorization_xml(&number, now, environment, &signed_xml);
            let path = self.write_document(DIR_AUTORIZADOS, &base_name, &authorization_xml)?;
            (Some(number), Some(now), Some(path))
        } else {
            (None, None, None)
        };

        info!(
            "SRI MOCK {}: {} para factura {}",
            environment.label(),
            status,
            invoice.number
        );
        Ok(SriSendResult {
            status: status.to_string(),
            access_key,
            authorization_number,
            authorized_at,
            messages: message,
            generated_xml_path,
            signed_xml_path,
            response_xml_path,
            authorized_xml_path,
        })
    }

    /// 49-digit access key: date + codDoc + RUC + ambiente + estab + ptoEmi +
    /// secuencial + 8-digit numeric code + tipo emisión + check digit.
    pub fn generate_access_key(
        &self,
        issued_at: DateTime<Utc>,
        sequential: i32,
        environment: SriEnvironment,
    ) -> String {
        let numeric_code = rand::thread_rng().gen_range(10_000_000..100_000_000u32);
        self.access_key_with_code(issued_at, sequential, environment, numeric_code)
    }

    pub fn access_key_with_code(
        &self,
        issued_at: DateTime<Utc>,
        sequential: i32,
        environment: SriEnvironment,
        numeric_code: u32,
    ) -> String {
        let base = format!(
            "{}01{}{}{:0>3}{:0>3}{:09}{:08}1",
            issued_at.format("%d%m%Y"),
            self.config.ruc,
            environment.ambiente_code(),
            self.config.establecimiento,
            self.config.punto_emision,
            sequential,
            numeric_code
        );
        let check = modulo11_check_digit(&base);
        format!("{}{}", base, check)
    }

    pub fn build_invoice_xml(
        &self,
        invoice: &Invoice,
        access_key: &str,
        environment: SriEnvironment,
    ) -> String {
        let estab = format!("{:0>3}", self.config.establecimiento);
        let pto_emi = format!("{:0>3}", self.config.punto_emision);
        let secuencial = format!("{:09}", invoice.sequential);
        let fecha_emision = invoice.issued_at.format("%d/%m/%Y").to_string();
        let dir_establecimiento = self
            .config
            .direccion_establecimiento
            .as_deref()
            .unwrap_or(&self.config.direccion_matriz);

        let mut details = String::new();
        for (i, item) in invoice.items.iter().enumerate() {
            let codigo = format!("{:03}", i + 1);
            let tax_percent_code = if item.tax > 0.0 { "4" } else { "0" };
            let tarifa = if item.tax > 0.0 { 15.0 } else { 0.0 };
            let descuento = item.quantity as f64 * item.unit_price * (item.discount_percent / 100.0);

            details.push_str(&format!(
                r#"    <detalle>
      <codigoPrincipal>{codigo}</codigoPrincipal>
      <descripcion>{descripcion}</descripcion>
      <cantidad>{cantidad}</cantidad>
      <precioUnitario>{precio}</precioUnitario>
      <descuento>{descuento}</descuento>
      <precioTotalSinImpuesto>{subtotal}</precioTotalSinImpuesto>
      <impuestos>
        <impuesto>
          <codigo>2</codigo>
          <codigoPorcentaje>{porcentaje}</codigoPorcentaje>
          <tarifa>{tarifa}</tarifa>
          <baseImponible>{subtotal}</baseImponible>
          <valor>{valor}</valor>
        </impuesto>
      </impuestos>
    </detalle>
"#,
                codigo = codigo,
                descripcion = escape_xml(&item.description),
                cantidad = item.quantity,
                precio = format_amount(item.unit_price),
                descuento = format_amount(descuento),
                subtotal = format_amount(item.subtotal),
                porcentaje = tax_percent_code,
                tarifa = format_amount(tarifa),
                valor = format_amount(item.tax),
            ));
        }

        let contribuyente_especial = self
            .config
            .contribuyente_especial
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| format!("    <contribuyenteEspecial>{}</contribuyenteEspecial>\n", escape_xml(v)))
            .unwrap_or_default();

        let obligado = if self.config.obligado_contabilidad.eq_ignore_ascii_case("NO") {
            "NO"
        } else {
            "SI"
        };

        let additional_info = build_additional_info_xml(invoice);

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<factura id="comprobante" version="1.0.0">
  <infoTributaria>
    <ambiente>{ambiente}</ambiente>
    <tipoEmision>1</tipoEmision>
    <razonSocial>{razon_social}</razonSocial>
    <nombreComercial>{nombre_comercial}</nombreComercial>
    <ruc>{ruc}</ruc>
    <claveAcceso>{access_key}</claveAcceso>
    <codDoc>01</codDoc>
    <estab>{estab}</estab>
    <ptoEmi>{pto_emi}</ptoEmi>
    <secuencial>{secuencial}</secuencial>
    <dirMatriz>{dir_matriz}</dirMatriz>
  </infoTributaria>
  <infoFactura>
    <fechaEmision>{fecha_emision}</fechaEmision>
    <dirEstablecimiento>{dir_establecimiento}</dirEstablecimiento>
{contribuyente_especial}    <obligadoContabilidad>{obligado}</obligadoContabilidad>
    <tipoIdentificacionComprador>{tipo_identificacion}</tipoIdentificacionComprador>
    <razonSocialComprador>{razon_social_comprador}</razonSocialComprador>
    <identificacionComprador>{identificacion}</identificacionComprador>
    <direccionComprador>{direccion_comprador}</direccionComprador>
    <totalSinImpuestos>{subtotal}</totalSinImpuestos>
    <totalDescuento>{descuento_total}</totalDescuento>
    <totalConImpuestos>
      <totalImpuesto>
        <codigo>2</codigo>
        <codigoPorcentaje>{porcentaje_total}</codigoPorcentaje>
        <baseImponible>{subtotal}</baseImponible>
        <valor>{tax}</valor>
      </totalImpuesto>
    </totalConImpuestos>
    <propina>0.00</propina>
    <importeTotal>{total}</importeTotal>
    <moneda>DOLAR</moneda>
    <pagos>
      <pago>
        <formaPago>{forma_pago}</formaPago>
        <total>{total_to_charge}</total>
      </pago>
    </pagos>
  </infoFactura>
  <detalles>
{details}  </detalles>
{additional_info}</factura>"#,
            ambiente = environment.ambiente_code(),
            razon_social = escape_xml(&self.config.razon_social),
            nombre_comercial = escape_xml(&self.config.nombre_comercial),
            ruc = escape_xml(&self.config.ruc),
            access_key = access_key,
            estab = estab,
            pto_emi = pto_emi,
            secuencial = secuencial,
            dir_matriz = escape_xml(&self.config.direccion_matriz),
            fecha_emision = fecha_emision,
            dir_establecimiento = escape_xml(dir_establecimiento),
            contribuyente_especial = contribuyente_especial,
            obligado = obligado,
            tipo_identificacion = escape_xml(&invoice.customer.identification_type),
            razon_social_comprador = escape_xml(&invoice.customer.name),
            identificacion = escape_xml(&invoice.customer.identification),
            direccion_comprador = escape_xml(invoice.customer.address.as_deref().unwrap_or("")),
            subtotal = format_amount(invoice.subtotal),
            descuento_total = format_amount(invoice.discount_total),
            porcentaje_total = if invoice.tax > 0.0 { "4" } else { "0" },
            tax = format_amount(invoice.tax),
            total = format_amount(invoice.total),
            forma_pago = invoice.payment_method.sri_code(),
            total_to_charge = format_amount(invoice.total_to_charge),
            details = details,
            additional_info = additional_info,
        )
    }

    fn write_document(
        &self,
        subdir: &str,
        base_name: &str,
        content: &str,
    ) -> Result<PathBuf, BillingError> {
        let dir = self.config.document_root.join(subdir);
        fs::create_dir_all(&dir)
            .map_err(|e| BillingError::DocumentError(format!("{}: {}", dir.display(), e)))?;

        let path = dir.join(format!("{}.xml", base_name));
        fs::write(&path, content)
            .map_err(|e| BillingError::DocumentError(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

fn generate_authorization_number(now: DateTime<Utc>) -> String {
    let suffix = rand::thread_rng().gen_range(100_000..1_000_000u32);
    format!("{}{}", now.format("%d%m%Y%H%M%S"), suffix)
}

fn build_reception_response_xml(status: &str, access_key: &str, message: Option<&str>) -> String {
    let messages_xml = match message {
        Some(message) if !message.trim().is_empty() => {
            let tipo = if status == STATUS_RECHAZADO { "ERROR" } else { "INFORMACION" };
            format!(
                r#"
    <comprobante>
      <claveAcceso>{access_key}</claveAcceso>
      <mensajes>
        <mensaje>
          <identificador>43</identificador>
          <mensaje>{mensaje}</mensaje>
          <tipo>{tipo}</tipo>
        </mensaje>
      </mensajes>
    </comprobante>"#,
                access_key = access_key,
                mensaje = escape_xml(message),
                tipo = tipo,
            )
        }
        _ => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<respuestaRecepcionComprobante>
  <estado>{status}</estado>{messages_xml}
</respuestaRecepcionComprobante>"#,
    )
}

fn build_authorization_xml(
    authorization_number: &str,
    authorized_at: DateTime<Utc>,
    environment: SriEnvironment,
    signed_xml: &str,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<autorizacion>
  <estado>AUTORIZADO</estado>
  <numeroAutorizacion>{number}</numeroAutorizacion>
  <fechaAutorizacion>{fecha}</fechaAutorizacion>
  <ambiente>{ambiente}</ambiente>
  <comprobante><![CDATA[{comprobante}]]></comprobante>
</autorizacion>"#,
        number = authorization_number,
        fecha = authorized_at.format("%Y-%m-%dT%H:%M:%SZ"),
        ambiente = environment.label(),
        comprobante = escape_cdata(signed_xml),
    )
}

fn build_additional_info_xml(invoice: &Invoice) -> String {
    let mut fields = Vec::new();

    if let Some(email) = invoice.customer.email.as_deref().filter(|v| !v.trim().is_empty()) {
        fields.push(format!(
            r#"    <campoAdicional nombre="Email">{}</campoAdicional>"#,
            escape_xml(email)
        ));
    }
    if let Some(phone) = invoice.customer.phone.as_deref().filter(|v| !v.trim().is_empty()) {
        fields.push(format!(
            r#"    <campoAdicional nombre="Telefono">{}</campoAdicional>"#,
            escape_xml(phone)
        ));
    }
    if let Some(address) = invoice.customer.address.as_deref().filter(|v| !v.trim().is_empty()) {
        fields.push(format!(
            r#"    <campoAdicional nombre="Direccion">{}</campoAdicional>"#,
            escape_xml(address)
        ));
    }
    if let Some(observations) = invoice.observations.as_deref().filter(|v| !v.trim().is_empty()) {
        fields.push(format!(
            r#"    <campoAdicional nombre="Observacion">{}</campoAdicional>"#,
            escape_xml(observations)
        ));
    }

    if fields.is_empty() {
        return String::new();
    }

    format!("  <infoAdicional>\n{}\n  </infoAdicional>\n", fields.join("\n"))
}

fn build_base_file_name(invoice_number: &str, access_key: &str, now: DateTime<Utc>) -> String {
    let safe_number: String = invoice_number
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}_{}", safe_number, access_key, now.format("%Y%m%d%H%M%S"))
}
