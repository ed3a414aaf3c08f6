//! `status_interno` derivation from a Shopee `order_status`.

use mkthub_core::StatusInterno;

const FULFILLED_BY_SHOPEE: &str = "fulfilled_by_shopee";

/// Maps `order_status` (and `fulfillment_flag` for ready orders). Unknown
/// statuses are treated as `Pendente`.
#[must_use]
pub fn derive_status(order_status: &str, fulfillment_flag: Option<&str>) -> StatusInterno {
    match order_status {
        "READY_TO_SHIP" if fulfillment_flag == Some(FULFILLED_BY_SHOPEE) => StatusInterno::Full,
        "READY_TO_SHIP" => StatusInterno::AEnviar,
        "PROCESSED" | "RETRY_SHIP" => StatusInterno::AguardandoColeta,
        "SHIPPED" | "TO_CONFIRM_RECEIVE" => StatusInterno::Enviado,
        "COMPLETED" => StatusInterno::Entregue,
        "TO_RETURN" => StatusInterno::Devolucao,
        "IN_CANCEL" | "CANCELLED" => StatusInterno::Cancelado,
        other => {
            if !matches!(other, "UNPAID" | "INVOICE_PENDING") {
                tracing::debug!(order_status = other, "unknown Shopee order status");
            }
            StatusInterno::Pendente
        }
    }
}
