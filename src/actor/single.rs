use kameo::{
    actor::{Actor, ActorRef, WeakActorRef},
    error::{ActorStopReason, Infallible, PanicError},
    message::{Context as KameoContext, Message},
};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, error};

use crate::actor::messages::{Alarm, Connect, Disconnect, Fault, HttpRequest, Incoming, RoomResponse, Start};
use crate::room::Room;
use crate::server::{
    OnAlarmPayload, OnClosePayload, OnConnectPayload, OnErrorPayload, OnMessagePayload, OnRequestPayload,
    OnStartPayload, Server,
};

/// Actor owning a room's server.
///
/// Every callback is a message, and the mailbox is drained one message at a
/// time, so the server sees a single total order of events and never runs
/// two callbacks at once.
pub struct Single {
    room: Arc<Room>,
    server: Box<dyn Server>,
    started: bool,
}

pub struct SingleArgs {
    pub room: Arc<Room>,
    pub server: Box<dyn Server>,
}

impl Actor for Single {
    type Args = SingleArgs;
    type Error = Infallible;

    async fn on_start(args: Self::Args, _: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(Self { room: args.room, server: args.server, started: false })
    }

    fn on_panic(&mut self, _: WeakActorRef<Self>, err: PanicError) -> impl Future<Output = Result<ControlFlow<ActorStopReason>, Self::Error>> + Send {
        error!(room = %self.room.id(), "room server panicked: {err:?}");
        async { Ok(ControlFlow::Continue(())) }
    }
}

impl Message<Start> for Single {
    type Reply = ();
    async fn handle(&mut self, _: Start, _: &mut KameoContext<Self, Self::Reply>) {
        if self.started { return; }
        self.started = true;
        self.server.on_start(OnStartPayload { room: &self.room }).await;
    }
}

impl Message<Connect> for Single {
    type Reply = ();
    async fn handle(&mut self, Connect(connection): Connect, _: &mut KameoContext<Self, Self::Reply>) {
        if self.room.add(connection.clone()).is_some() {
            debug!(room = %self.room.id(), connection = connection.id(), "replaced connection with the same id");
        }
        self.server.on_connect(OnConnectPayload { room: &self.room, connection: &connection }).await;
    }
}

impl Message<Incoming> for Single {
    type Reply = ();
    async fn handle(&mut self, msg: Incoming, _: &mut KameoContext<Self, Self::Reply>) {
        self.server.on_message(OnMessagePayload { room: &self.room, sender: &msg.sender, message: msg.message }).await;
    }
}

impl Message<Disconnect> for Single {
    type Reply = ();
    async fn handle(&mut self, Disconnect(connection): Disconnect, _: &mut KameoContext<Self, Self::Reply>) {
        self.room.remove(&connection);
        self.server.on_close(OnClosePayload { room: &self.room, connection: &connection }).await;
    }
}

impl Message<Fault> for Single {
    type Reply = ();
    async fn handle(&mut self, msg: Fault, _: &mut KameoContext<Self, Self::Reply>) {
        self.server.on_error(OnErrorPayload { room: &self.room, connection: &msg.connection, error: &msg.error }).await;
    }
}

impl Message<HttpRequest> for Single {
    type Reply = RoomResponse;
    async fn handle(&mut self, HttpRequest(request): HttpRequest, _: &mut KameoContext<Self, Self::Reply>) -> RoomResponse {
        RoomResponse(self.server.on_request(OnRequestPayload { room: &self.room, request }).await)
    }
}

impl Message<Alarm> for Single {
    type Reply = ();
    async fn handle(&mut self, _: Alarm, _: &mut KameoContext<Self, Self::Reply>) {
        self.server.on_alarm(OnAlarmPayload { room: &self.room }).await;
    }
}
