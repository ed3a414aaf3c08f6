//! The internal order status (`status_interno`) and its transition rule.
//!
//! Each connector derives a candidate status from its own vendor fields; the
//! stored status only moves through [`StatusInterno::advance`], so a stale
//! payload delivered out of order cannot drag an order backwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Coarse order status shown to operators, independent of the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusInterno {
    /// Waiting for payment or for the marketplace to release the order.
    Pendente,
    /// Paid and waiting for the seller to prepare the package.
    AEnviar,
    /// Label printed or shipment arranged; waiting for the carrier.
    AguardandoColeta,
    Enviado,
    Entregue,
    /// Stocked and shipped by the marketplace's own warehouse.
    Full,
    Devolucao,
    Cancelado,
}

impl StatusInterno {
    pub const ALL: [StatusInterno; 8] = [
        StatusInterno::Pendente,
        StatusInterno::AEnviar,
        StatusInterno::AguardandoColeta,
        StatusInterno::Enviado,
        StatusInterno::Entregue,
        StatusInterno::Full,
        StatusInterno::Devolucao,
        StatusInterno::Cancelado,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatusInterno::Pendente => "Pendente",
            StatusInterno::AEnviar => "A enviar",
            StatusInterno::AguardandoColeta => "Aguardando coleta",
            StatusInterno::Enviado => "Enviado",
            StatusInterno::Entregue => "Entregue",
            StatusInterno::Full => "Full",
            StatusInterno::Devolucao => "Devolução",
            StatusInterno::Cancelado => "Cancelado",
        }
    }

    /// `Cancelado` and `Devolução` never change once stored.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, StatusInterno::Cancelado | StatusInterno::Devolucao)
    }

    /// Orders in these states give their reserved stock back.
    #[must_use]
    pub fn releases_stock(self) -> bool {
        self.is_terminal()
    }

    /// Position in the forward lifecycle. Terminal states have no rank.
    fn rank(self) -> Option<u8> {
        match self {
            StatusInterno::Pendente => Some(0),
            StatusInterno::AEnviar | StatusInterno::Full => Some(1),
            StatusInterno::AguardandoColeta => Some(2),
            StatusInterno::Enviado => Some(3),
            StatusInterno::Entregue => Some(4),
            StatusInterno::Devolucao | StatusInterno::Cancelado => None,
        }
    }

    /// Combines the stored status with a freshly derived one.
    ///
    /// With no stored status the incoming one wins. A terminal stored status
    /// is kept. A terminal incoming status always wins over a non-terminal
    /// one. Otherwise the status only moves forward (or sideways between
    /// equally ranked states).
    #[must_use]
    pub fn advance(current: Option<StatusInterno>, incoming: StatusInterno) -> StatusInterno {
        let Some(current) = current else {
            return incoming;
        };
        if current.is_terminal() {
            return current;
        }
        match (current.rank(), incoming.rank()) {
            (Some(cur), Some(inc)) if inc < cur => current,
            _ => incoming,
        }
    }
}

impl fmt::Display for StatusInterno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusInterno {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusInterno::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

impl Serialize for StatusInterno {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StatusInterno {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::StatusInterno::{
        AEnviar, AguardandoColeta, Cancelado, Devolucao, Entregue, Enviado, Full, Pendente,
    };
    use super::*;

    #[test]
    fn labels_round_trip() {
        for status in StatusInterno::ALL {
            assert_eq!(status.as_str().parse::<StatusInterno>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!(matches!(
            "Extraviado".parse::<StatusInterno>(),
            Err(CoreError::UnknownStatus(_))
        ));
    }

    #[test]
    fn first_status_is_taken_as_is() {
        assert_eq!(StatusInterno::advance(None, Enviado), Enviado);
        assert_eq!(StatusInterno::advance(None, Cancelado), Cancelado);
    }

    #[test]
    fn moves_forward() {
        assert_eq!(StatusInterno::advance(Some(Pendente), AEnviar), AEnviar);
        assert_eq!(StatusInterno::advance(Some(AEnviar), AguardandoColeta), AguardandoColeta);
        assert_eq!(StatusInterno::advance(Some(AguardandoColeta), Enviado), Enviado);
        assert_eq!(StatusInterno::advance(Some(Enviado), Entregue), Entregue);
    }

    #[test]
    fn stale_payload_does_not_move_backwards() {
        assert_eq!(StatusInterno::advance(Some(Enviado), AEnviar), Enviado);
        assert_eq!(StatusInterno::advance(Some(Entregue), Pendente), Entregue);
        assert_eq!(StatusInterno::advance(Some(Full), Pendente), Full);
    }

    #[test]
    fn equal_rank_switches_sideways() {
        assert_eq!(StatusInterno::advance(Some(AEnviar), Full), Full);
        assert_eq!(StatusInterno::advance(Some(Full), AEnviar), AEnviar);
    }

    #[test]
    fn terminal_states_are_sticky() {
        for incoming in StatusInterno::ALL {
            assert_eq!(StatusInterno::advance(Some(Cancelado), incoming), Cancelado);
            assert_eq!(StatusInterno::advance(Some(Devolucao), incoming), Devolucao);
        }
    }

    #[test]
    fn cancellation_and_return_win_from_any_open_state() {
        for current in [Pendente, AEnviar, AguardandoColeta, Enviado, Entregue, Full] {
            assert_eq!(StatusInterno::advance(Some(current), Cancelado), Cancelado);
            assert_eq!(StatusInterno::advance(Some(current), Devolucao), Devolucao);
        }
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&AguardandoColeta).unwrap();
        assert_eq!(json, "\"Aguardando coleta\"");
        let back: StatusInterno = serde_json::from_str("\"Devolução\"").unwrap();
        assert_eq!(back, Devolucao);
    }

    #[test]
    fn only_terminal_states_release_stock() {
        assert!(Cancelado.releases_stock());
        assert!(Devolucao.releases_stock());
        assert!(!Entregue.releases_stock());
        assert!(!Pendente.releases_stock());
    }
}
