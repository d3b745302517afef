//! Supply-order flow.
//!
//! A clinic orders biopsy kits, shipping containers and collection tubes.
//! The order row is the primary write; the notification to the lab is
//! dispatched afterwards and its failure is swallowed (logged only), so the
//! clinic's order is never lost to a flaky notification function.

use crate::config::CoreConfig;
use crate::error::CaseResult;
use crate::model::{KitOrder, KitOrderItems, NewKitOrder};
use crate::session::SessionContext;
use crate::stores::{KitOrderStore, Notification, Notifier, ReferenceDirectory};
use chrono::Utc;
use std::sync::Arc;

/// Clinic-submitted supply-order form data.
#[derive(Debug, Clone, Default)]
pub struct KitOrderForm {
    pub items: KitOrderItems,
    /// Falls back to the clinic's address on file when empty.
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Persists kit orders and notifies the lab.
#[derive(Clone)]
pub struct KitOrderService {
    cfg: Arc<CoreConfig>,
    orders: Arc<dyn KitOrderStore>,
    directory: Arc<dyn ReferenceDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl KitOrderService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        orders: Arc<dyn KitOrderStore>,
        directory: Arc<dyn ReferenceDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cfg,
            orders,
            directory,
            notifier,
        }
    }

    /// Inserts a `pending` order for the session's effective clinic, then
    /// dispatches the order notification to the lab address from config.
    ///
    /// # Errors
    ///
    /// Propagates the insert failure. Notification failure is logged and
    /// swallowed; the order is returned regardless.
    pub fn place_order(
        &self,
        session: &SessionContext,
        form: KitOrderForm,
    ) -> CaseResult<KitOrder> {
        let clinic_id = session.require_clinic()?;
        let clinic = self.directory.fetch_clinic(clinic_id)?;

        let shipping_address = form
            .shipping_address
            .filter(|addr| !addr.trim().is_empty())
            .or_else(|| clinic.address.clone())
            .unwrap_or_default();

        let order = self.orders.insert_order(NewKitOrder {
            clinic_id,
            ordered_by_user_id: session.actor().id,
            items: form.items,
            shipping_address: shipping_address.clone(),
            notes: form.notes.clone(),
            created_at: Utc::now(),
        })?;

        let notification = Notification::KitOrderPlaced {
            to: self.cfg.lab_order_email().clone(),
            clinic_name: clinic.name.to_string(),
            clinic_contact: session.actor().email.clone(),
            order_id: order.id,
            items: order.items,
            shipping_address,
            notes: form.notes,
        };

        if let Err(error) = self.notifier.notify(&notification) {
            tracing::warn!(order_id = %order.id, %error, "kit-order notification failed");
        }

        Ok(order)
    }
}
