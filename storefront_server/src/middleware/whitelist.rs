//! Peer IP whitelist for Actix Web.
//!
//! When a whitelist is configured, only requests whose remote address (see [`get_remote_ip`]) is on the list are
//! passed on. Without a whitelist every request is allowed.

use std::{
    future::{ready, Ready},
    net::IpAddr,
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorForbidden,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};

use crate::helpers::get_remote_ip;

pub struct IpWhitelistFactory {
    whitelist: Option<Arc<Vec<IpAddr>>>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl IpWhitelistFactory {
    pub fn new(whitelist: Option<Vec<IpAddr>>, use_x_forwarded_for: bool, use_forwarded: bool) -> Self {
        Self { whitelist: whitelist.map(Arc::new), use_x_forwarded_for, use_forwarded }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IpWhitelistFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IpWhitelistService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IpWhitelistService {
            whitelist: self.whitelist.clone(),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct IpWhitelistService<S> {
    whitelist: Option<Arc<Vec<IpAddr>>>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IpWhitelistService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let whitelist = self.whitelist.clone();
        let peer_ip = get_remote_ip(req.request(), self.use_x_forwarded_for, self.use_forwarded);
        Box::pin(async move {
            let whitelisted = match (peer_ip, whitelist) {
                (Some(ip), Some(whitelist)) => {
                    info!("💻️ Webhook call from {ip}");
                    whitelist.contains(&ip)
                },
                (_, None) => true,
                (None, Some(_)) => {
                    warn!("💻️ No IP address found for the remote peer. Denying access.");
                    false
                },
            };
            if whitelisted {
                service.call(req).await
            } else {
                let peer = peer_ip.map(|ip| ip.to_string()).unwrap_or_default();
                warn!("💻️ {peer} is not on the webhook whitelist. Denying access.");
                Err(ErrorForbidden("Remote peer is not whitelisted."))
            }
        })
    }
}
