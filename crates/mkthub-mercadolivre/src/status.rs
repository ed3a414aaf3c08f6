//! `status_interno` derivation from a Mercado Livre order and shipment.

use mkthub_core::StatusInterno;

use crate::types::{MlOrder, MlShipment};

const UNPAID_ORDER_STATUSES: [&str; 3] = ["payment_required", "payment_in_process", "partially_paid"];
const RETURN_SUBSTATUSES: [&str; 2] = ["returning_to_sender", "returned"];
const AWAITING_PICKUP_SUBSTATUSES: [&str; 6] = [
    "printed",
    "in_hub",
    "picked_up",
    "dropped_off",
    "in_packing_list",
    "ready_for_pickup",
];

/// Derives the internal status. First matching rule wins.
#[must_use]
pub fn derive_status(order: &MlOrder, shipment: Option<&MlShipment>) -> StatusInterno {
    let order_status = order.status.as_str();
    let ship_status = shipment.and_then(|s| s.status.as_deref());
    let ship_substatus = shipment.and_then(|s| s.substatus.as_deref());

    if matches!(order_status, "cancelled" | "invalid") || ship_status == Some("cancelled") {
        return StatusInterno::Cancelado;
    }

    if ship_status == Some("not_delivered")
        || ship_substatus.is_some_and(|s| RETURN_SUBSTATUSES.contains(&s))
        || order.tags.iter().any(|t| t == "returned")
    {
        return StatusInterno::Devolucao;
    }

    match ship_status {
        Some("delivered") => return StatusInterno::Entregue,
        Some("shipped") => return StatusInterno::Enviado,
        _ => {}
    }

    if UNPAID_ORDER_STATUSES.contains(&order_status) {
        return StatusInterno::Pendente;
    }

    if shipment.and_then(MlShipment::logistic_type) == Some("fulfillment") {
        return StatusInterno::Full;
    }

    if ship_status == Some("ready_to_ship")
        && ship_substatus.is_some_and(|s| AWAITING_PICKUP_SUBSTATUSES.contains(&s))
    {
        return StatusInterno::AguardandoColeta;
    }

    if matches!(ship_status, Some("ready_to_ship" | "handling"))
        || (order_status == "paid" && shipment.is_none())
    {
        return StatusInterno::AEnviar;
    }

    StatusInterno::Pendente
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: &str) -> MlOrder {
        MlOrder {
            id: 1,
            status: status.to_owned(),
            ..MlOrder::default()
        }
    }

    fn shipment(status: &str, substatus: Option<&str>) -> MlShipment {
        MlShipment {
            id: 9,
            status: Some(status.to_owned()),
            substatus: substatus.map(str::to_owned),
            ..MlShipment::default()
        }
    }

    #[test]
    fn cancelled_order_or_shipment_is_cancelado() {
        assert_eq!(derive_status(&order("cancelled"), None), StatusInterno::Cancelado);
        assert_eq!(derive_status(&order("invalid"), None), StatusInterno::Cancelado);
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("cancelled", None))),
            StatusInterno::Cancelado
        );
    }

    #[test]
    fn returns_are_devolucao() {
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("not_delivered", None))),
            StatusInterno::Devolucao
        );
        assert_eq!(
            derive_status(
                &order("paid"),
                Some(&shipment("shipped", Some("returning_to_sender")))
            ),
            StatusInterno::Devolucao
        );
        let mut tagged = order("paid");
        tagged.tags.push("returned".to_owned());
        assert_eq!(derive_status(&tagged, None), StatusInterno::Devolucao);
    }

    #[test]
    fn shipment_progress_maps_forward() {
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("delivered", None))),
            StatusInterno::Entregue
        );
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("shipped", Some("out_for_delivery")))),
            StatusInterno::Enviado
        );
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("ready_to_ship", Some("printed")))),
            StatusInterno::AguardandoColeta
        );
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("ready_to_ship", Some("ready_to_print")))),
            StatusInterno::AEnviar
        );
        assert_eq!(
            derive_status(&order("paid"), Some(&shipment("handling", None))),
            StatusInterno::AEnviar
        );
    }

    #[test]
    fn unpaid_orders_are_pendente() {
        assert_eq!(derive_status(&order("payment_required"), None), StatusInterno::Pendente);
        assert_eq!(
            derive_status(&order("payment_in_process"), Some(&shipment("pending", None))),
            StatusInterno::Pendente
        );
    }

    #[test]
    fn fulfillment_is_full() {
        let mut s = shipment("ready_to_ship", Some("in_warehouse"));
        s.logistic_type = Some("fulfillment".to_owned());
        assert_eq!(derive_status(&order("paid"), Some(&s)), StatusInterno::Full);
    }

    #[test]
    fn paid_without_shipment_is_a_enviar() {
        assert_eq!(derive_status(&order("paid"), None), StatusInterno::AEnviar);
    }

    #[test]
    fn unknown_combination_is_pendente() {
        assert_eq!(
            derive_status(&order("confirmed"), Some(&shipment("pending", None))),
            StatusInterno::Pendente
        );
    }
}
